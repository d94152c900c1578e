use crate::error::DistributorError;
use core_logic::{WalletGenerator, WalletRecord};
use ethers::prelude::*;
use ethers::utils::to_checksum;
use rand::rngs::OsRng;

/// Fresh secp256k1 keys from the OS RNG, checksummed address.
#[derive(Debug, Default)]
pub struct EthersWalletGenerator;

impl WalletGenerator for EthersWalletGenerator {
    fn generate(&mut self) -> WalletRecord {
        let wallet = LocalWallet::new(&mut OsRng);
        let address = to_checksum(&wallet.address(), None);
        let secret = format!("0x{}", hex::encode(wallet.signer().to_bytes()));
        WalletRecord::new(address, secret)
    }
}

pub fn wallet_from_record(record: &WalletRecord) -> Result<LocalWallet, DistributorError> {
    parse_private_key(record.secret(), record.address())
}

pub fn parse_private_key(secret: &str, label: &str) -> Result<LocalWallet, DistributorError> {
    secret
        .trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map_err(|e| DistributorError::config(label, format!("invalid private key: {}", e)))
}

pub fn record_address(record: &WalletRecord) -> Result<Address, DistributorError> {
    record
        .address()
        .parse::<Address>()
        .map_err(|e| DistributorError::config(record.address(), e.to_string()))
}
