use crate::error::StoreError;
use crate::traits::WalletGenerator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// One recipient (or test) account: hex address plus hex private key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct WalletRecord {
    address: String,
    #[serde(alias = "privateKey")]
    secret: String,
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("address", &self.address)
            .field("secret", &"***REDACTED***")
            .finish()
    }
}

impl WalletRecord {
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: secret.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

/// Loads the canonical wallet sequence, or creates and persists it.
pub struct WalletStore;

impl WalletStore {
    /// Returns the first `count` records of the store at `path` (all of them
    /// when `count` is `None`). When the file does not exist, `count` fresh
    /// records are generated and written once before being returned.
    pub fn load_or_generate<G: WalletGenerator>(
        path: impl AsRef<Path>,
        count: Option<usize>,
        generator: &mut G,
    ) -> Result<Vec<WalletRecord>, StoreError> {
        let path = path.as_ref();

        if path.exists() {
            info!("[WalletStore] Loading wallets from {}", path.display());
            let mut wallets = Self::load(path)?;
            match count {
                Some(n) if n < wallets.len() => wallets.truncate(n),
                Some(n) if n > wallets.len() => {
                    warn!(
                        "[WalletStore] Requested {} wallets but {} only holds {}",
                        n,
                        path.display(),
                        wallets.len()
                    );
                }
                _ => {}
            }
            return Ok(wallets);
        }

        let count = count.ok_or_else(|| StoreError::MissingCount {
            path: path.display().to_string(),
        })?;

        info!("[WalletStore] Generating {} wallets...", count);
        let mut seen = HashSet::with_capacity(count);
        let mut wallets = Vec::with_capacity(count);
        while wallets.len() < count {
            let record = generator.generate();
            if seen.insert(record.address().to_lowercase()) {
                wallets.push(record);
            }
        }

        Self::persist(path, &wallets)?;
        info!(
            "[WalletStore] {} wallets generated and saved to {}",
            wallets.len(),
            path.display()
        );
        Ok(wallets)
    }

    /// Parses and validates the whole store.
    pub fn load(path: &Path) -> Result<Vec<WalletRecord>, StoreError> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let wallets: Vec<WalletRecord> =
            serde_json::from_str(&content).map_err(|e| StoreError::corrupt(path, e.to_string()))?;

        let mut seen = HashSet::with_capacity(wallets.len());
        for (index, wallet) in wallets.iter().enumerate() {
            if !is_hex_of_len(wallet.address(), 20) {
                return Err(StoreError::corrupt(
                    path,
                    format!("record {} has a malformed address", index),
                ));
            }
            if !is_hex_of_len(wallet.secret(), 32) {
                return Err(StoreError::corrupt(
                    path,
                    format!("record {} ({}) has a malformed secret", index, wallet.address()),
                ));
            }
            if !seen.insert(wallet.address().to_lowercase()) {
                return Err(StoreError::corrupt(
                    path,
                    format!("duplicate address {} at record {}", wallet.address(), index),
                ));
            }
        }

        Ok(wallets)
    }

    /// Single write: temp file in the target directory, then atomic rename.
    fn persist(path: &Path, wallets: &[WalletRecord]) -> Result<(), StoreError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| StoreError::io(path, e))?;

        let mut body =
            serde_json::to_string_pretty(wallets).map_err(|e| StoreError::io(path, e))?;
        body.push('\n');

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(path, e))?;
        tmp.write_all(body.as_bytes())
            .map_err(|e| StoreError::io(path, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io(path, e))?;
        tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
        Ok(())
    }
}

fn is_hex_of_len(value: &str, bytes: usize) -> bool {
    let Some(digits) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) else {
        return false;
    };
    digits.len() == bytes * 2 && hex::decode(digits).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SeqGenerator(u64);

    impl WalletGenerator for SeqGenerator {
        fn generate(&mut self) -> WalletRecord {
            self.0 += 1;
            WalletRecord::new(format!("0x{:040x}", self.0), format!("0x{:064x}", self.0))
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let record = WalletRecord::new(format!("0x{:040x}", 1), format!("0x{:064x}", 99));
        let printed = format!("{:?}", record);
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains(&format!("{:064x}", 99)));
    }

    #[test]
    fn test_generate_requires_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        let err = WalletStore::load_or_generate(&path, None, &mut SeqGenerator(0)).unwrap_err();
        assert!(matches!(err, StoreError::MissingCount { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_legacy_private_key_field_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        let body = format!(
            "[{{\"address\":\"0x{:040x}\",\"privateKey\":\"0x{:064x}\"}}]",
            7, 7
        );
        fs::write(&path, body).unwrap();

        let wallets = WalletStore::load(&path).unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].secret(), format!("0x{:064x}", 7));
    }

    #[test]
    fn test_hex_shape_check() {
        assert!(is_hex_of_len(&format!("0x{:040x}", 5), 20));
        assert!(!is_hex_of_len(&format!("{:040x}", 5), 20));
        assert!(!is_hex_of_len("0x1234", 20));
        assert!(!is_hex_of_len(&format!("0x{}", "zz".repeat(20)), 20));
    }
}
