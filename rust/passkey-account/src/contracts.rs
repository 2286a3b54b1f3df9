//! ABI bindings for the contracts a passkey account talks to.

use alloy_sol_types::sol;

sol! {
    /// Deploys passkey accounts at deterministic addresses.
    #[derive(Debug, PartialEq, Eq)]
    interface IPassKeysAccountFactory {
        /// Deploy (or return) the account for `keyId` at salt `index`.
        function createAccount(uint256 index, uint256 keyId, uint256[2] publicKey)
            external
            returns (address account);
    }

    /// The passkey account itself.
    #[derive(Debug, PartialEq, Eq)]
    interface IPassKeysAccount {
        /// The account's current entry-point nonce.
        function nonce() external view returns (uint256);

        /// Call `dest` with `value` wei and calldata `func`.
        function execute(address dest, uint256 value, bytes calldata func) external;
    }

    /// The ERC-4337 v0.6 entry point.
    #[derive(Debug, PartialEq, Eq)]
    interface IEntryPoint {
        /// Always reverts with `SenderAddressResult`.
        function getSenderAddress(bytes initCode) external;

        /// The counterfactual address `initCode` would deploy.
        error SenderAddressResult(address sender);
    }
}
