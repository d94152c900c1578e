//! Bindings for the three external contracts and the calldata the engine
//! sends to them.

use crate::error::{ChainError, DistributorError};
use ethers::abi::{AbiDecode, AbiEncode};
use ethers::prelude::*;

ethers::contract::abigen!(
    IErc20Allowance,
    r#"[
        function allowance(address owner, address spender) returns (uint256)
        function approve(address spender, uint256 amount) returns (bool)
    ]"#
);

ethers::contract::abigen!(
    IMultiSender,
    r#"[
        function multiSendToken(address token, address[] recipients, uint256[] amounts)
    ]"#
);

ethers::contract::abigen!(
    IClaimFaucet,
    r#"[
        function owner() returns (address)
        function setClaimableAmounts(address[] addresses, uint256[] amounts)
        function claim()
    ]"#
);

/// One encoded call (or plain value transfer) against a target address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub method: &'static str,
    pub data: Bytes,
    pub value: U256,
}

impl ContractCall {
    fn encoded(to: Address, method: &'static str, data: Vec<u8>) -> Self {
        Self {
            to,
            method,
            data: Bytes::from(data),
            value: U256::zero(),
        }
    }

    pub fn allowance(token: Address, owner: Address, spender: Address) -> Self {
        Self::encoded(
            token,
            "allowance",
            AllowanceCall { owner, spender }.encode(),
        )
    }

    pub fn approve(token: Address, spender: Address, amount: U256) -> Self {
        Self::encoded(token, "approve", ApproveCall { spender, amount }.encode())
    }

    /// Fails before encoding when the arrays differ in length; the contract
    /// would revert on it anyway.
    pub fn multi_send(
        multi_sender: Address,
        token: Address,
        recipients: Vec<Address>,
        amounts: Vec<U256>,
    ) -> Result<Self, DistributorError> {
        check_lengths(&recipients, &amounts)?;
        Ok(Self::encoded(
            multi_sender,
            "multiSendToken",
            MultiSendTokenCall {
                token,
                recipients,
                amounts,
            }
            .encode(),
        ))
    }

    pub fn owner(faucet: Address) -> Self {
        Self::encoded(faucet, "owner", OwnerCall.encode())
    }

    pub fn set_claimable_amounts(
        faucet: Address,
        addresses: Vec<Address>,
        amounts: Vec<U256>,
    ) -> Result<Self, DistributorError> {
        check_lengths(&addresses, &amounts)?;
        Ok(Self::encoded(
            faucet,
            "setClaimableAmounts",
            SetClaimableAmountsCall { addresses, amounts }.encode(),
        ))
    }

    pub fn claim(faucet: Address) -> Self {
        Self::encoded(faucet, "claim", ClaimCall.encode())
    }

    /// Plain native-currency transfer, no calldata.
    pub fn native_transfer(to: Address, value: U256) -> Self {
        Self {
            to,
            method: "transfer",
            data: Bytes::new(),
            value,
        }
    }
}

fn check_lengths(recipients: &[Address], amounts: &[U256]) -> Result<(), DistributorError> {
    if recipients.len() != amounts.len() || recipients.is_empty() {
        return Err(DistributorError::LengthMismatch {
            recipients: recipients.len(),
            amounts: amounts.len(),
        });
    }
    Ok(())
}

pub fn decode_u256(raw: &[u8]) -> Result<U256, ChainError> {
    U256::decode(raw).map_err(|e| ChainError::Decode(e.to_string()))
}

pub fn decode_address(raw: &[u8]) -> Result<Address, ChainError> {
    Address::decode(raw).map_err(|e| ChainError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_send_roundtrips_through_abigen_types() {
        let recipients = vec![Address::from_low_u64_be(1), Address::from_low_u64_be(2)];
        let amounts = vec![U256::from(5u64); 2];
        let call = ContractCall::multi_send(
            Address::from_low_u64_be(9),
            Address::from_low_u64_be(7),
            recipients.clone(),
            amounts.clone(),
        )
        .unwrap();

        let decoded = MultiSendTokenCall::decode(&call.data).unwrap();
        assert_eq!(decoded.token, Address::from_low_u64_be(7));
        assert_eq!(decoded.recipients, recipients);
        assert_eq!(decoded.amounts, amounts);
        assert_eq!(call.method, "multiSendToken");
        assert_eq!(call.value, U256::zero());
    }

    #[test]
    fn test_length_mismatch_is_rejected_client_side() {
        let err = ContractCall::set_claimable_amounts(
            Address::zero(),
            vec![Address::from_low_u64_be(1)],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DistributorError::LengthMismatch {
                recipients: 1,
                amounts: 0
            }
        ));
    }

    #[test]
    fn test_decode_return_words() {
        let word = U256::from(1_000_000u64).encode();
        assert_eq!(decode_u256(&word).unwrap(), U256::from(1_000_000u64));

        let owner = Address::from_low_u64_be(42);
        assert_eq!(decode_address(&owner.encode()).unwrap(), owner);
        assert!(decode_u256(&[1, 2, 3]).is_err());
    }
}
