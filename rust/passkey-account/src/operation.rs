//! ERC-4337 (v0.6) user operations.

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

/// Gas parameters of a user operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasLimits {
    /// Gas for the account's `execute` call.
    pub call_gas_limit: U256,
    /// Gas for deployment plus signature validation.
    pub verification_gas_limit: U256,
    /// Overhead the bundler charges on top of execution.
    pub pre_verification_gas: U256,
    /// EIP-1559 fee cap, in wei per gas.
    pub max_fee_per_gas: U256,
    /// EIP-1559 priority fee, in wei per gas.
    pub max_priority_fee_per_gas: U256,
}

impl Default for GasLimits {
    fn default() -> Self {
        Self {
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::from(100_000u64),
            pre_verification_gas: U256::ZERO,
            max_fee_per_gas: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
        }
    }
}

/// A user operation that has not been signed yet.
///
/// Fields are filled in with the `with_*` setters; [`into_signed`] consumes
/// the operation once its signature is known.
///
/// [`into_signed`]: PendingOperation::into_signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    sender: Address,
    nonce: U256,
    init_code: Bytes,
    call_data: Bytes,
    #[serde(flatten)]
    gas: GasLimits,
    paymaster_and_data: Bytes,
}

impl PendingOperation {
    /// An operation from `sender` with default gas and no init-code.
    pub fn new(sender: Address, nonce: U256) -> Self {
        Self {
            sender,
            nonce,
            init_code: Bytes::new(),
            call_data: Bytes::new(),
            gas: GasLimits::default(),
            paymaster_and_data: Bytes::new(),
        }
    }

    /// Set the nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: U256) -> Self {
        self.nonce = nonce;
        self
    }

    /// Deploy the account with `init_code` before executing.
    #[must_use]
    pub fn with_init_code(mut self, init_code: impl Into<Bytes>) -> Self {
        self.init_code = init_code.into();
        self
    }

    /// Set the calldata the account executes.
    #[must_use]
    pub fn with_call_data(mut self, call_data: impl Into<Bytes>) -> Self {
        self.call_data = call_data.into();
        self
    }

    /// Set every gas parameter.
    #[must_use]
    pub fn with_gas(mut self, gas: GasLimits) -> Self {
        self.gas = gas;
        self
    }

    /// Sponsor the operation: paymaster address followed by its data.
    #[must_use]
    pub fn with_paymaster_and_data(mut self, paymaster_and_data: impl Into<Bytes>) -> Self {
        self.paymaster_and_data = paymaster_and_data.into();
        self
    }

    /// The account the operation runs as.
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// The entry-point nonce.
    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    /// Deployment code, empty for a deployed account.
    pub fn init_code(&self) -> &Bytes {
        &self.init_code
    }

    /// Calldata for the account.
    pub fn call_data(&self) -> &Bytes {
        &self.call_data
    }

    /// Gas parameters.
    pub fn gas(&self) -> &GasLimits {
        &self.gas
    }

    /// Paymaster address and data, empty when unsponsored.
    pub fn paymaster_and_data(&self) -> &Bytes {
        &self.paymaster_and_data
    }

    /// The hash the account's signature must cover.
    ///
    /// Dynamic fields are replaced by their keccak-256 before packing, then
    /// the packed operation is bound to `entry_point` and `chain_id`.
    pub fn user_op_hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        let packed = (
            self.sender,
            self.nonce,
            keccak256(&self.init_code),
            keccak256(&self.call_data),
            self.gas.call_gas_limit,
            self.gas.verification_gas_limit,
            self.gas.pre_verification_gas,
            self.gas.max_fee_per_gas,
            self.gas.max_priority_fee_per_gas,
            keccak256(&self.paymaster_and_data),
        )
            .abi_encode_params();

        keccak256((keccak256(packed), entry_point, U256::from(chain_id)).abi_encode_params())
    }

    /// Attach `signature`, ending the operation's mutable phase.
    pub fn into_signed(self, signature: impl Into<Bytes>) -> SignedOperation {
        SignedOperation {
            operation: self,
            signature: signature.into(),
        }
    }
}

/// A user operation ready for a bundler.
///
/// Serializes to the camelCase JSON object `eth_sendUserOperation` expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedOperation {
    #[serde(flatten)]
    operation: PendingOperation,
    signature: Bytes,
}

impl SignedOperation {
    /// The account the operation runs as.
    pub fn sender(&self) -> Address {
        self.operation.sender
    }

    /// The entry-point nonce.
    pub fn nonce(&self) -> U256 {
        self.operation.nonce
    }

    /// Deployment code, empty for a deployed account.
    pub fn init_code(&self) -> &Bytes {
        &self.operation.init_code
    }

    /// Calldata for the account.
    pub fn call_data(&self) -> &Bytes {
        &self.operation.call_data
    }

    /// Gas parameters.
    pub fn gas(&self) -> &GasLimits {
        &self.operation.gas
    }

    /// Paymaster address and data, empty when unsponsored.
    pub fn paymaster_and_data(&self) -> &Bytes {
        &self.operation.paymaster_and_data
    }

    /// The encoded passkey signature.
    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    /// Recompute the hash the signature was made over.
    pub fn user_op_hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        self.operation.user_op_hash(entry_point, chain_id)
    }
}
