//! Building and signing user operations for a passkey account.

use crate::{
    config::AccountConfig,
    contracts::{IEntryPoint, IPassKeysAccount, IPassKeysAccountFactory},
    error::{AccountError, ReaderError},
    operation::{GasLimits, PendingOperation, SignedOperation},
    reader::AccountReader,
};
use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::{SolCall, SolError};
use passkey_credentials::{KeyPair, PasskeySigningAdapter, authenticator::Authenticator};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tracing::{debug, instrument, trace};

/// Turns calls into signed user operations for one passkey account.
///
/// The account address comes from [`AccountConfig::account_address`] when
/// set, otherwise the counterfactual address is resolved once through the
/// entry point and memoised. Deployment is
/// sticky: after code has been observed at the address the account is never
/// treated as phantom again.
pub struct AccountOperationBuilder<R, A> {
    config: AccountConfig,
    key_pair: KeyPair,
    reader: R,
    signer: PasskeySigningAdapter<A>,
    address: OnceCell<Address>,
    deployed: AtomicBool,
}

impl<R, A> AccountOperationBuilder<R, A>
where
    R: AccountReader,
    A: Authenticator,
{
    /// A builder for the account `key_pair` controls under `config`.
    pub fn new(
        config: AccountConfig,
        key_pair: KeyPair,
        reader: R,
        signer: PasskeySigningAdapter<A>,
    ) -> Self {
        let address = OnceCell::new_with(config.account_address);
        Self {
            config,
            key_pair,
            reader,
            signer,
            address,
            deployed: AtomicBool::new(false),
        }
    }

    /// The account configuration.
    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    /// The passkey controlling the account.
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// The chain reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// The factory address followed by `createAccount` calldata for this key.
    ///
    /// # Errors
    ///
    /// [`AccountError::MissingFactoryAddress`] if no factory is configured.
    pub fn init_code(&self) -> Result<Bytes, AccountError> {
        let factory = self.config.factory()?;
        let call = IPassKeysAccountFactory::createAccountCall {
            index: self.config.index,
            keyId: self.key_pair.key_identifier().as_u256(),
            publicKey: [self.key_pair.public_key_x(), self.key_pair.public_key_y()],
        };

        let mut init_code = factory.to_vec();
        init_code.extend(call.abi_encode());
        Ok(init_code.into())
    }

    /// The address the factory deploys (or deployed) this account at.
    ///
    /// A configured `account_address` is returned as is. Otherwise the entry
    /// point answers `getSenderAddress` only by reverting with
    /// `SenderAddressResult`, so a successful call is an error.
    #[instrument(skip_all, fields(key_id = %self.key_pair.key_id()), err)]
    pub async fn account_address(&self) -> Result<Address, AccountError> {
        self.address
            .get_or_try_init(|| async {
                let call = IEntryPoint::getSenderAddressCall {
                    initCode: self.init_code()?,
                };
                let outcome = self
                    .reader
                    .call(self.config.entry_point, call.abi_encode().into())
                    .await;

                let revert = match outcome {
                    Err(ReaderError::Reverted(revert)) => revert,
                    Err(error) => {
                        return Err(AccountError::call_failed(
                            IEntryPoint::getSenderAddressCall::SIGNATURE,
                            error,
                        ));
                    }
                    Ok(_) => {
                        return Err(AccountError::call_failed(
                            IEntryPoint::getSenderAddressCall::SIGNATURE,
                            "returned instead of reverting with SenderAddressResult",
                        ));
                    }
                };
                let sender = IEntryPoint::SenderAddressResult::abi_decode(&revert)
                    .map_err(|e| {
                        AccountError::call_failed(IEntryPoint::getSenderAddressCall::SIGNATURE, e)
                    })?
                    .sender;

                debug!(%sender, "resolved counterfactual address");
                Ok(sender)
            })
            .await
            .copied()
    }

    /// Whether the account has yet to be deployed.
    pub async fn is_phantom(&self) -> Result<bool, AccountError> {
        if self.deployed.load(Ordering::Acquire) {
            return Ok(false);
        }

        let address = self.account_address().await?;
        let code = self
            .reader
            .code(address)
            .await
            .map_err(|e| AccountError::call_failed("eth_getCode", e))?;

        if code.is_empty() {
            return Ok(true);
        }
        self.deployed.store(true, Ordering::Release);
        trace!(%address, code = code.len(), "account deployed");
        Ok(false)
    }

    /// The account's entry-point nonce; zero while the account is phantom.
    #[instrument(skip_all, err)]
    pub async fn nonce(&self) -> Result<U256, AccountError> {
        if self.is_phantom().await? {
            return Ok(U256::ZERO);
        }

        let address = self.account_address().await?;
        let returned = self
            .reader
            .call(address, IPassKeysAccount::nonceCall {}.abi_encode().into())
            .await
            .map_err(|e| AccountError::call_failed(IPassKeysAccount::nonceCall::SIGNATURE, e))?;

        IPassKeysAccount::nonceCall::abi_decode_returns(&returned)
            .map_err(|e| AccountError::call_failed(IPassKeysAccount::nonceCall::SIGNATURE, e))
    }

    /// Init-code while the account is phantom, empty bytes afterwards.
    pub async fn init_code_if_needed(&self) -> Result<Bytes, AccountError> {
        if self.is_phantom().await? {
            self.init_code()
        } else {
            Ok(Bytes::new())
        }
    }

    /// Calldata for the account to call `target` with `value` and `data`.
    pub fn encode_execute(&self, target: Address, value: U256, data: impl Into<Bytes>) -> Bytes {
        IPassKeysAccount::executeCall {
            dest: target,
            value,
            func: data.into(),
        }
        .abi_encode()
        .into()
    }

    /// An unsigned operation executing one call from this account.
    #[instrument(skip_all, fields(%target, %value), err)]
    pub async fn create_unsigned_operation(
        &self,
        target: Address,
        value: U256,
        data: impl Into<Bytes>,
        gas: GasLimits,
    ) -> Result<PendingOperation, AccountError> {
        let sender = self.account_address().await?;
        let nonce = self.nonce().await?;
        let init_code = self.init_code_if_needed().await?;

        Ok(PendingOperation::new(sender, nonce)
            .with_init_code(init_code)
            .with_call_data(self.encode_execute(target, value, data))
            .with_gas(gas))
    }

    /// The hash `operation` is signed over for this account's chain.
    pub fn user_op_hash(&self, operation: &PendingOperation) -> B256 {
        operation.user_op_hash(self.config.entry_point, self.config.chain_id)
    }

    /// Sign `hash` with the passkey and return the encoded signature field.
    #[instrument(skip_all, fields(%hash), err)]
    pub async fn sign_user_op_hash(&self, hash: B256) -> Result<Bytes, AccountError> {
        let signature = self.signer.sign(&self.key_pair, hash).await?;
        Ok(signature.abi_encode())
    }

    /// Sign `operation`, consuming it.
    pub async fn sign_operation(
        &self,
        operation: PendingOperation,
    ) -> Result<SignedOperation, AccountError> {
        let hash = self.user_op_hash(&operation);
        let signature = self.sign_user_op_hash(hash).await?;
        Ok(operation.into_signed(signature))
    }

    /// [`create_unsigned_operation`] followed by [`sign_operation`].
    ///
    /// [`create_unsigned_operation`]: Self::create_unsigned_operation
    /// [`sign_operation`]: Self::sign_operation
    pub async fn create_signed_operation(
        &self,
        target: Address,
        value: U256,
        data: impl Into<Bytes>,
        gas: GasLimits,
    ) -> Result<SignedOperation, AccountError> {
        let operation = self
            .create_unsigned_operation(target, value, data, gas)
            .await?;
        self.sign_operation(operation).await
    }
}
