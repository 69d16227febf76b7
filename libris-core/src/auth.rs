//! Email login with an optional TOTP second factor.
//!
//! A member's secret is written only once they have proven they can produce
//! a code from it, and is wiped when two-factor login is switched off.

use crate::error::{LibraryError, Result};
use crate::model::Member;
use crate::store::RecordStore;
use crate::totp::{self, GeneratedSecret};
use crate::Library;
use chrono::{DateTime, Utc};
use log::{info, warn};

/// First step of a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// The member who logged in.
    pub member: Member,
    /// Whether a TOTP code must be verified before the login completes.
    pub requires_two_factor: bool,
}

impl<S: RecordStore> Library<S> {
    /// Starts a login for `email`. Unknown emails answer `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the member collection cannot be read.
    pub fn login(&self, email: &str) -> Result<Option<LoginOutcome>> {
        let Some(member) = self.find_member_by_email(email)? else {
            info!("Login refused for unknown email '{}'", email.trim());
            return Ok(None);
        };
        let requires_two_factor = member.two_factor_enabled;
        info!(
            "Member '{}' logged in{}",
            member.id,
            if requires_two_factor { ", awaiting second factor" } else { "" }
        );
        Ok(Some(LoginOutcome {
            member,
            requires_two_factor,
        }))
    }

    /// Generates a fresh secret for a member to enrol in an authenticator app.
    ///
    /// Nothing is stored until [`Library::enable_two_factor`] succeeds.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] if the member does not exist.
    /// - [`LibraryError::Entropy`] if no randomness is available.
    pub fn begin_two_factor(&self, member_id: &str) -> Result<GeneratedSecret> {
        let member = self
            .get_member(member_id)?
            .ok_or_else(|| LibraryError::not_found("member", member_id))?;
        totp::generate_secret(&self.config.totp, &member.email)
    }

    /// Turns on two-factor login if `code` is valid for `secret` at `now`.
    ///
    /// Answers `false`, changing nothing, when the code does not match.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::NotFound`] if the member does not exist.
    pub fn enable_two_factor(
        &mut self,
        member_id: &str,
        secret: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut member = self
            .get_member(member_id)?
            .ok_or_else(|| LibraryError::not_found("member", member_id))?;
        if !totp::validate(secret, code, now, &self.config.totp) {
            warn!("Two-factor enrolment for member '{member_id}' failed: code did not match");
            return Ok(false);
        }
        let Some(raw) = totp::decode_secret(secret) else {
            return Ok(false);
        };

        member.two_factor_secret = Some(totp::encode_secret(&raw));
        member.two_factor_enabled = true;
        self.save_member(&member)?;
        info!("Two-factor login enabled for member '{member_id}'");
        Ok(true)
    }

    /// Checks the second factor of a login.
    ///
    /// Members without two-factor login never verify, and neither does a
    /// member flagged for it whose secret is missing.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::NotFound`] if the member does not exist.
    pub fn verify_two_factor(&self, member_id: &str, code: &str, now: DateTime<Utc>) -> Result<bool> {
        let member = self
            .get_member(member_id)?
            .ok_or_else(|| LibraryError::not_found("member", member_id))?;
        let verified = match (&member.two_factor_secret, member.two_factor_enabled) {
            (Some(secret), true) => totp::validate(secret, code, now, &self.config.totp),
            _ => false,
        };
        if !verified {
            warn!("Second factor rejected for member '{member_id}'");
        }
        Ok(verified)
    }

    /// Turns off two-factor login and forgets the secret.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::NotFound`] if the member does not exist.
    pub fn disable_two_factor(&mut self, member_id: &str) -> Result<Member> {
        let mut member = self
            .get_member(member_id)?
            .ok_or_else(|| LibraryError::not_found("member", member_id))?;
        member.two_factor_enabled = false;
        member.two_factor_secret = None;
        self.save_member(&member)?;
        info!("Two-factor login disabled for member '{member_id}'");
        Ok(member)
    }
}
