//! Account configuration.

use crate::error::AccountError;
use alloy_primitives::{Address, U256, address};
use serde::{Deserialize, Serialize};

/// The canonical ERC-4337 v0.6 entry point.
pub const ENTRY_POINT_V06: Address = address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

/// Where the account lives and how it is deployed.
///
/// Deserializes from camelCase JSON; `index` defaults to zero and
/// `factoryAddress` may be omitted for accounts that are already deployed,
/// in which case `accountAddress` names the account.
///
/// ```
/// # use passkey_account::AccountConfig;
/// let config = AccountConfig::from_json(
///     r#"{"entryPoint":"0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789","chainId":1}"#,
/// )
/// .unwrap();
/// assert!(config.factory_address.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
    /// Factory that deploys the account on its first operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_address: Option<Address>,
    /// Address of an existing account. Skips the counterfactual lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_address: Option<Address>,
    /// Salt distinguishing several accounts for the same key.
    #[serde(default)]
    pub index: U256,
    /// The entry point the account trusts.
    pub entry_point: Address,
    /// Chain the operations are signed for.
    pub chain_id: u64,
}

impl AccountConfig {
    /// A configuration for `chain_id` using `entry_point`.
    #[must_use]
    pub const fn new(entry_point: Address, chain_id: u64) -> Self {
        Self {
            factory_address: None,
            account_address: None,
            index: U256::ZERO,
            entry_point,
            chain_id,
        }
    }

    /// Set the factory address.
    #[must_use]
    pub const fn with_factory(mut self, factory_address: Address) -> Self {
        self.factory_address = Some(factory_address);
        self
    }

    /// Use the account already deployed at `account_address`.
    #[must_use]
    pub const fn with_account_address(mut self, account_address: Address) -> Self {
        self.account_address = Some(account_address);
        self
    }

    /// Set the account index.
    #[must_use]
    pub const fn with_index(mut self, index: U256) -> Self {
        self.index = index;
        self
    }

    /// Parse a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the document does not match.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The configured factory. A zero address counts as unset.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::MissingFactoryAddress`] when no factory is set.
    pub fn factory(&self) -> Result<Address, AccountError> {
        self.factory_address
            .filter(|address| !address.is_zero())
            .ok_or(AccountError::MissingFactoryAddress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_parses_camel_case_json_with_defaults() {
        let config = AccountConfig::from_json(
            r#"{
                "factoryAddress": "0x1111111111111111111111111111111111111111",
                "entryPoint": "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789",
                "chainId": 80001
            }"#,
        )
        .unwrap();

        assert_eq!(config.index, U256::ZERO);
        assert_eq!(config.entry_point, ENTRY_POINT_V06);
        assert_eq!(config.chain_id, 80001);
        assert_eq!(config.factory().unwrap(), Address::repeat_byte(0x11));
    }

    #[test]
    fn it_treats_a_zero_factory_as_unset() {
        let config = AccountConfig::new(ENTRY_POINT_V06, 1);
        assert_eq!(config.factory(), Err(AccountError::MissingFactoryAddress));
        assert_eq!(
            config.with_factory(Address::ZERO).factory(),
            Err(AccountError::MissingFactoryAddress)
        );
    }

    #[test]
    fn it_parses_an_existing_account_without_a_factory() {
        let config = AccountConfig::from_json(
            r#"{
                "accountAddress": "0x4444444444444444444444444444444444444444",
                "entryPoint": "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789",
                "chainId": 1
            }"#,
        )
        .unwrap();

        assert_eq!(config.account_address, Some(Address::repeat_byte(0x44)));
        assert_eq!(config.factory(), Err(AccountError::MissingFactoryAddress));
    }

    #[test]
    fn it_round_trips_through_json() {
        let config = AccountConfig::new(ENTRY_POINT_V06, 10)
            .with_factory(Address::repeat_byte(0x22))
            .with_index(U256::from(3u8));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"factoryAddress\""));
        assert_eq!(AccountConfig::from_json(&json).unwrap(), config);
    }
}
