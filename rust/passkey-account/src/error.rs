use alloy_primitives::Bytes;
use passkey_credentials::CredentialError;
use thiserror::Error;

/// Failures reported by an [`AccountReader`](crate::reader::AccountReader).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    /// The call reverted. Carries the raw revert payload.
    #[error("execution reverted ({} bytes of revert data)", .0.len())]
    Reverted(Bytes),

    /// The node could not be reached or answered with garbage.
    #[error("chain read failed: {0}")]
    Transport(String),
}

/// Errors from building or signing account operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    /// Init-code was needed but no (non-zero) factory address is configured.
    #[error("factoryAddress is not set")]
    MissingFactoryAddress,

    /// A contract read failed or returned something undecodable.
    #[error("{call} failed: {reason}")]
    ContractCallFailed {
        /// The contract function that was called.
        call: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// Signing failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl AccountError {
    pub(crate) fn call_failed(call: &'static str, reason: impl ToString) -> Self {
        Self::ContractCallFailed {
            call,
            reason: reason.to_string(),
        }
    }
}
