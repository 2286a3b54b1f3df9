//! Read-only chain access.
//!
//! The builder never talks to a node directly. It asks an [`AccountReader`]
//! for deployed code and for the results of `eth_call`s, which keeps
//! transport concerns (JSON-RPC, retries, caching) out of this crate.

use crate::{
    contracts::{IEntryPoint, IPassKeysAccount},
    error::ReaderError,
};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolError, SolValue};
use parking_lot::RwLock;
use passkey_credentials::platform::{ConditionalSend, ConditionalSync};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Read-only access to chain state.
pub trait AccountReader: ConditionalSync {
    /// The code deployed at `address` (empty if none).
    fn code(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<Bytes, ReaderError>> + ConditionalSend;

    /// Execute `data` against `to` without a transaction.
    ///
    /// A revert must be reported as [`ReaderError::Reverted`] with the
    /// revert payload intact; some contracts answer only through reverts.
    fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = Result<Bytes, ReaderError>> + ConditionalSend;
}

impl<R> AccountReader for std::sync::Arc<R>
where
    R: AccountReader,
{
    fn code(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<Bytes, ReaderError>> + ConditionalSend {
        R::code(self, address)
    }

    fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = Result<Bytes, ReaderError>> + ConditionalSend {
        R::call(self, to, data)
    }
}

/// A scripted, in-memory [`AccountReader`] for tests and offline use.
///
/// Unknown calls fail with [`ReaderError::Transport`].
#[derive(Debug, Default)]
pub struct InMemoryChain {
    code: RwLock<HashMap<Address, Bytes>>,
    calls: RwLock<HashMap<(Address, Bytes), Result<Bytes, ReaderError>>>,
    reads: AtomicUsize,
}

impl InMemoryChain {
    /// An empty chain: no code anywhere, every call fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy `code` at `address`.
    pub fn set_code(&self, address: Address, code: impl Into<Bytes>) {
        self.code.write().insert(address, code.into());
    }

    /// Answer calls of `data` against `to` with `result`.
    pub fn set_call(&self, to: Address, data: impl Into<Bytes>, result: Result<Bytes, ReaderError>) {
        self.calls.write().insert((to, data.into()), result);
    }

    /// Make `entry_point.getSenderAddress(init_code)` revert with `sender`.
    pub fn set_sender_address(&self, entry_point: Address, init_code: &Bytes, sender: Address) {
        let call = IEntryPoint::getSenderAddressCall {
            initCode: init_code.clone(),
        };
        let revert = IEntryPoint::SenderAddressResult { sender }.abi_encode();
        self.set_call(
            entry_point,
            call.abi_encode(),
            Err(ReaderError::Reverted(revert.into())),
        );
    }

    /// Make `account.nonce()` return `nonce`.
    pub fn set_nonce(&self, account: Address, nonce: U256) {
        self.set_call(
            account,
            IPassKeysAccount::nonceCall {}.abi_encode(),
            Ok(nonce.abi_encode().into()),
        );
    }

    /// Number of reads (code and calls) served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl AccountReader for InMemoryChain {
    async fn code(&self, address: Address) -> Result<Bytes, ReaderError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.code.read().get(&address).cloned().unwrap_or_default())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ReaderError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.calls
            .read()
            .get(&(to, data))
            .cloned()
            .unwrap_or_else(|| Err(ReaderError::Transport(format!("no call scripted for {to}"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[tokio::test]
    async fn it_reports_empty_code_for_unknown_addresses() -> TestResult {
        let chain = InMemoryChain::new();
        assert!(chain.code(Address::repeat_byte(1)).await?.is_empty());

        chain.set_code(Address::repeat_byte(1), vec![0x60, 0x80]);
        assert_eq!(
            chain.code(Address::repeat_byte(1)).await?,
            Bytes::from(vec![0x60, 0x80])
        );
        assert_eq!(chain.reads(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn it_replays_scripted_calls_and_reverts() -> TestResult {
        let chain = InMemoryChain::new();
        let account = Address::repeat_byte(2);
        chain.set_nonce(account, U256::from(9u8));

        let nonce = chain
            .call(account, IPassKeysAccount::nonceCall {}.abi_encode().into())
            .await?;
        assert_eq!(
            IPassKeysAccount::nonceCall::abi_decode_returns(&nonce)?,
            U256::from(9u8)
        );

        assert!(matches!(
            chain.call(account, Bytes::new()).await,
            Err(ReaderError::Transport(_))
        ));
        Ok(())
    }
}
