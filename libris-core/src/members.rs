use crate::error::{LibraryError, Result};
use crate::model::{BorrowRecord, Member, MemberDraft};
use crate::store::{Collection, RecordStore};
use crate::Library;
use chrono::{DateTime, Utc};
use log::info;
use uuid::Uuid;

impl<S: RecordStore> Library<S> {
    /// Every registered member.
    ///
    /// # Errors
    ///
    /// Returns an error if the member collection cannot be read.
    pub fn members(&self) -> Result<Vec<Member>> {
        self.store.get_all(Collection::Members)
    }

    /// Looks up a member by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the member collection cannot be read.
    pub fn get_member(&self, member_id: &str) -> Result<Option<Member>> {
        Ok(self.members()?.into_iter().find(|m| m.id == member_id))
    }

    /// Looks up a member by login email, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the member collection cannot be read.
    pub fn find_member_by_email(&self, email: &str) -> Result<Option<Member>> {
        let email = email.trim();
        Ok(self
            .members()?
            .into_iter()
            .find(|m| m.email.eq_ignore_ascii_case(email)))
    }

    /// Registers a new member, without two-factor login.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::DuplicateEmail`] if the email is taken.
    pub fn add_member(&mut self, draft: MemberDraft, now: DateTime<Utc>) -> Result<Member> {
        let mut members = self.members()?;
        let email = draft.email.trim().to_string();
        if members.iter().any(|m| m.email.eq_ignore_ascii_case(&email)) {
            return Err(LibraryError::DuplicateEmail(email));
        }
        let member = Member {
            id: Uuid::new_v4().to_string(),
            email,
            name: draft.name,
            role: draft.role,
            phone: draft.phone,
            joined_date: now,
            two_factor_enabled: false,
            two_factor_secret: None,
        };
        members.push(member.clone());
        self.store.set_all(Collection::Members, &members)?;
        info!("Registered member '{}' ({}) as {}", member.id, member.email, member.role);
        Ok(member)
    }

    /// Replaces a member's contact details and role. Two-factor state is kept.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] if the member does not exist.
    /// - [`LibraryError::DuplicateEmail`] if another member has the new email.
    pub fn update_member(&mut self, member_id: &str, draft: MemberDraft) -> Result<Member> {
        let mut members = self.members()?;
        let email = draft.email.trim().to_string();
        if members
            .iter()
            .any(|m| m.id != member_id && m.email.eq_ignore_ascii_case(&email))
        {
            return Err(LibraryError::DuplicateEmail(email));
        }
        let member = members
            .iter_mut()
            .find(|m| m.id == member_id)
            .ok_or_else(|| LibraryError::not_found("member", member_id))?;
        member.email = email;
        member.name = draft.name;
        member.role = draft.role;
        member.phone = draft.phone;
        let updated = member.clone();

        self.store.set_all(Collection::Members, &members)?;
        info!("Updated member '{member_id}'");
        Ok(updated)
    }

    /// Removes a member. Removing an unknown member is a no-op answering `false`.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::MemberHasLoans`] while the member holds loans.
    pub fn delete_member(&mut self, member_id: &str) -> Result<bool> {
        let mut members = self.members()?;
        let Some(idx) = members.iter().position(|m| m.id == member_id) else {
            return Ok(false);
        };
        let loans: Vec<BorrowRecord> = self.store.get_all(Collection::Loans)?;
        let active = loans
            .iter()
            .filter(|r| r.member_id == member_id && !r.is_returned())
            .count();
        if active > 0 {
            return Err(LibraryError::MemberHasLoans {
                member_id: member_id.to_string(),
                active,
            });
        }
        members.remove(idx);
        self.store.set_all(Collection::Members, &members)?;
        info!("Removed member '{member_id}'");
        Ok(true)
    }

    pub(crate) fn save_member(&mut self, member: &Member) -> Result<()> {
        let mut members = self.members()?;
        let slot = members
            .iter_mut()
            .find(|m| m.id == member.id)
            .ok_or_else(|| LibraryError::not_found("member", member.id.clone()))?;
        *slot = member.clone();
        self.store.set_all(Collection::Members, &members)
    }
}
