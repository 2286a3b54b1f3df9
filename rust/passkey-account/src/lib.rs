//! ERC-4337 smart accounts controlled by a passkey.
//!
//! A passkey account is deployed lazily: until its first operation lands it
//! only exists as a counterfactual address derived from the factory's
//! init-code. [`AccountOperationBuilder`] hides that distinction. It
//! resolves the address, decides whether init-code is needed, fills in the
//! nonce and has the passkey sign the resulting user operation.
//!
//! Chain state is read through an [`AccountReader`]; this crate sends no
//! transactions.

pub mod builder;
pub mod config;
pub mod contracts;
pub mod error;
pub mod operation;
pub mod reader;

pub use builder::AccountOperationBuilder;
pub use config::{AccountConfig, ENTRY_POINT_V06};
pub use error::{AccountError, ReaderError};
pub use operation::{GasLimits, PendingOperation, SignedOperation};
pub use reader::{AccountReader, InMemoryChain};
