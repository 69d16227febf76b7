// File:    totp.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: Time-based one-time passwords: secret generation, code derivation and windowed validation.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Time-based one-time passwords (RFC 6238) over HMAC-based codes (RFC 4226).
//!
//! The shared secret never leaves the member record; possession is proven by
//! submitting the code for the current time step.

use crate::config::{TotpAlgorithm, TotpSettings};
use crate::error::{LibraryError, Result};
use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::{TryRngCore, rngs::OsRng};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

/// Length of a freshly generated secret, in bytes.
pub const SECRET_LEN: usize = 20;

/// A new shared secret, ready to be shown to the member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSecret {
    /// The secret bytes.
    pub raw: Vec<u8>,
    /// The secret as unpadded base-32, the form stored and typed by hand.
    pub base32: String,
    /// `otpauth://` URI for authenticator apps.
    pub otpauth_url: String,
}

/// Generates a random secret for `account` and its provisioning URI.
///
/// # Errors
///
/// Returns [`LibraryError::Entropy`] if the operating system RNG fails.
pub fn generate_secret(settings: &TotpSettings, account: &str) -> Result<GeneratedSecret> {
    let mut rng = OsRng;
    let mut raw = vec![0u8; SECRET_LEN];
    rng.try_fill_bytes(&mut raw)
        .map_err(|e| LibraryError::Entropy(e.to_string()))?;

    let base32 = encode_secret(&raw);
    let otpauth_url = provisioning_uri(settings, account, &base32);
    Ok(GeneratedSecret {
        raw,
        base32,
        otpauth_url,
    })
}

/// Encodes secret bytes as unpadded base-32.
#[must_use]
pub fn encode_secret(raw: &[u8]) -> String {
    BASE32_NOPAD.encode(raw)
}

/// Decodes a base-32 secret, ignoring case, whitespace and `=` padding.
///
/// Returns `None` for anything that is not a non-empty base-32 string.
#[must_use]
pub fn decode_secret(encoded: &str) -> Option<Vec<u8>> {
    let normalized: String = encoded
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .trim_end_matches('=')
        .to_ascii_uppercase();
    let raw = BASE32_NOPAD.decode(normalized.as_bytes()).ok()?;
    if raw.is_empty() { None } else { Some(raw) }
}

/// Builds the `otpauth://totp/...` URI understood by authenticator apps.
#[must_use]
pub fn provisioning_uri(settings: &TotpSettings, account: &str, secret_base32: &str) -> String {
    let issuer = percent_encode(&settings.issuer);
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret_base32}&issuer={issuer}&algorithm={algorithm}&digits={digits}&period={period}",
        account = percent_encode(account),
        algorithm = settings.algorithm,
        digits = settings.digits,
        period = settings.period,
    )
}

/// The time step containing `unix_secs`.
#[must_use]
pub const fn counter_at(unix_secs: u64, period: u64) -> u64 {
    if period == 0 {
        unix_secs
    } else {
        unix_secs / period
    }
}

/// Derives the code for one counter value.
///
/// The counter is fed to the HMAC as 8 big-endian bytes, the digest is
/// dynamically truncated to 31 bits and reduced modulo `10^digits`.
#[must_use]
pub fn compute_code(secret: &[u8], counter: u64, settings: &TotpSettings) -> String {
    let digest = hmac_digest(settings.algorithm, secret, counter);
    let digits = settings.digits.min(10);
    let code = truncate(&digest) % 10u64.pow(digits);
    format!("{code:0width$}", width = digits as usize)
}

/// Derives the code valid at `unix_secs`.
#[must_use]
pub fn code_at(secret: &[u8], unix_secs: u64, settings: &TotpSettings) -> String {
    compute_code(secret, counter_at(unix_secs, settings.period), settings)
}

/// The code a base-32 secret produces at `now`, if the secret decodes.
#[must_use]
pub fn current_code(secret_base32: &str, now: DateTime<Utc>, settings: &TotpSettings) -> Option<String> {
    let secret = decode_secret(secret_base32)?;
    let unix_secs = u64::try_from(now.timestamp()).ok()?;
    Some(code_at(&secret, unix_secs, settings))
}

/// Checks `submitted` against the codes of the current step and `window`
/// steps on either side.
///
/// Fails closed: a malformed secret, a code of the wrong shape or a time
/// before the epoch all answer `false`.
#[must_use]
pub fn validate(
    secret_base32: &str,
    submitted: &str,
    now: DateTime<Utc>,
    settings: &TotpSettings,
) -> bool {
    let Some(secret) = decode_secret(secret_base32) else {
        log::warn!("Rejecting TOTP code: stored secret is not valid base-32");
        return false;
    };

    let submitted = submitted.trim();
    if submitted.len() != settings.digits.min(10) as usize
        || !submitted.bytes().all(|b| b.is_ascii_digit())
    {
        return false;
    }

    let Ok(unix_secs) = u64::try_from(now.timestamp()) else {
        return false;
    };

    let current = counter_at(unix_secs, settings.period);
    let first = current.saturating_sub(settings.window);
    let last = current.saturating_add(settings.window);
    (first..=last).any(|counter| {
        let expected = compute_code(&secret, counter, settings);
        constant_time_eq(expected.as_bytes(), submitted.as_bytes())
    })
}

fn hmac_digest(algorithm: TotpAlgorithm, key: &[u8], counter: u64) -> Vec<u8> {
    let message = counter.to_be_bytes();
    // HMAC accepts keys of any length, so key setup cannot fail.
    match algorithm {
        TotpAlgorithm::Sha1 => Hmac::<Sha1>::new_from_slice(key).map_or_else(
            |_| Vec::new(),
            |mut mac| {
                mac.update(&message);
                mac.finalize().into_bytes().to_vec()
            },
        ),
        TotpAlgorithm::Sha256 => Hmac::<Sha256>::new_from_slice(key).map_or_else(
            |_| Vec::new(),
            |mut mac| {
                mac.update(&message);
                mac.finalize().into_bytes().to_vec()
            },
        ),
        TotpAlgorithm::Sha512 => Hmac::<Sha512>::new_from_slice(key).map_or_else(
            |_| Vec::new(),
            |mut mac| {
                mac.update(&message);
                mac.finalize().into_bytes().to_vec()
            },
        ),
    }
}

fn truncate(digest: &[u8]) -> u64 {
    let Some(&last) = digest.last() else {
        return 0;
    };
    let offset = usize::from(last & 0x0f);
    match digest.get(offset..offset + 4) {
        Some(&[a, b, c, d]) => u64::from(u32::from_be_bytes([a, b, c, d]) & 0x7fff_ffff),
        _ => 0,
    }
}

/// Constant-time byte comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'@') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
