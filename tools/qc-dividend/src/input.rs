//! Input files: JSON ledger snapshots and TOML configuration.

use anyhow::{bail, Context, Result};
use qc_18_dividend_distribution::{AccountId, DividendConfig, LedgerAccount, LedgerSeq};
use serde::Deserialize;
use std::path::Path;

/// Ledger snapshot as exported by a node.
#[derive(Debug, Deserialize)]
pub struct SnapshotFile {
    pub ledger_seq: LedgerSeq,
    pub accounts: Vec<AccountRow>,
}

#[derive(Debug, Deserialize)]
pub struct AccountRow {
    /// 40 hex characters.
    pub account: String,
    #[serde(default)]
    pub coin_balance: u64,
    pub vbc_balance: u64,
    #[serde(default)]
    pub parent: Option<String>,
}

impl SnapshotFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }

    pub fn ledger_accounts(&self) -> Result<Vec<LedgerAccount>> {
        self.accounts
            .iter()
            .map(|row| {
                let id = parse_account(&row.account)?;
                let account = LedgerAccount::new(id, row.coin_balance, row.vbc_balance);
                Ok(match &row.parent {
                    Some(parent) => account.with_parent(
                        parse_account(parent)
                            .with_context(|| format!("Bad parent of {}", row.account))?,
                    ),
                    None => account,
                })
            })
            .collect()
    }
}

pub fn parse_account(encoded: &str) -> Result<AccountId> {
    let raw = hex::decode(encoded.trim().trim_start_matches("0x"))
        .with_context(|| format!("Account id {encoded} is not hex"))?;
    let Ok(id) = <AccountId>::try_from(raw.as_slice()) else {
        bail!("Account id {encoded} must be 20 bytes, got {}", raw.len());
    };
    Ok(id)
}

/// Load a TOML config, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<DividendConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => DividendConfig::default(),
    };
    config.validate().context("Invalid dividend configuration")?;
    Ok(config)
}
