// File:    config.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: Library-wide settings persisted next to the record collections.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Name of the configuration file inside a library directory.
pub const CONFIG_FILE: &str = "config.json";

/// Largest accepted TOTP drift window, in steps on either side.
pub const MAX_WINDOW: u64 = 10;

/// HMAC hash used to derive TOTP codes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TotpAlgorithm {
    /// HMAC-SHA1, what every authenticator app understands.
    #[default]
    Sha1,
    /// HMAC-SHA256.
    Sha256,
    /// HMAC-SHA512.
    Sha512,
}

impl fmt::Display for TotpAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        };
        f.pad(label)
    }
}

/// Parameters of the time-based one-time password scheme.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct TotpSettings {
    /// Issuer shown in authenticator apps.
    pub issuer: String,
    /// HMAC hash.
    pub algorithm: TotpAlgorithm,
    /// Number of digits in a code.
    pub digits: u32,
    /// Length of a time step in seconds.
    pub period: u64,
    /// Adjacent steps accepted on either side of the current one.
    pub window: u64,
}

impl Default for TotpSettings {
    fn default() -> Self {
        Self {
            issuer: "Libris".to_string(),
            algorithm: TotpAlgorithm::Sha1,
            digits: 6,
            period: 30,
            window: 1,
        }
    }
}

/// Lending rules.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LoanPolicy {
    /// Loan length used when no due date is given.
    pub loan_days: i64,
    /// Fine per started day of lateness, in cents.
    pub fine_rate_cents: u64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            loan_days: 14,
            fine_rate_cents: 50,
        }
    }
}

/// All settings of one library.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct LibraryConfig {
    /// Two-factor login parameters.
    pub totp: TotpSettings,
    /// Lending rules.
    pub loans: LoanPolicy,
}

impl LibraryConfig {
    /// Rejects settings the engines cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::InvalidConfig`] naming the first bad setting.
    pub fn check(&self) -> Result<()> {
        let invalid = |message: String| Err(LibraryError::InvalidConfig(message));
        if self.totp.period == 0 {
            return invalid("totp.period must be at least 1 second".to_string());
        }
        if !(6..=10).contains(&self.totp.digits) {
            return invalid(format!("totp.digits must be 6 to 10, got {}", self.totp.digits));
        }
        if self.totp.window > MAX_WINDOW {
            return invalid(format!(
                "totp.window must be at most {MAX_WINDOW}, got {}",
                self.totp.window
            ));
        }
        if self.loans.loan_days < 1 {
            return invalid(format!(
                "loans.loanDays must be at least 1, got {}",
                self.loans.loan_days
            ));
        }
        Ok(())
    }
}

/// Loads the configuration of the library at `library_path`.
///
/// A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if a
/// setting is out of range.
pub fn load_config(library_path: &Path) -> Result<LibraryConfig> {
    let config_path = library_path.join(CONFIG_FILE);
    if !config_path.exists() {
        log::debug!("No {CONFIG_FILE} in '{}', using defaults", library_path.display());
        return Ok(LibraryConfig::default());
    }
    let config_str = fs::read_to_string(config_path)?;
    let config: LibraryConfig = serde_json::from_str(&config_str)?;
    config.check()?;
    Ok(config)
}

/// Saves `config` into the library at `library_path`.
///
/// # Errors
///
/// Returns an error if a setting is out of range or the file cannot be
/// serialized or written.
pub fn save_config(library_path: &Path, config: &LibraryConfig) -> Result<()> {
    config.check()?;
    let config_str = serde_json::to_string_pretty(config)?;
    fs::write(library_path.join(CONFIG_FILE), config_str)?;
    Ok(())
}
