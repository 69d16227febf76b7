use crate::error::{LibraryError, Result};
use crate::loans::project_status;
use crate::model::{BorrowStatus, Reservation, ReservationStatus};
use crate::store::{Collection, RecordStore};
use crate::Library;
use chrono::{DateTime, Utc};

/// Figures shown to staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LibraryStats {
    /// Catalogued titles.
    pub total_books: usize,
    /// Loans not yet returned.
    pub active_loans: usize,
    /// Reservations waiting for staff.
    pub pending_reservations: usize,
    /// Active loans past their due date.
    pub overdue: usize,
}

/// Figures shown to a borrower about their own loans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemberStats {
    /// Loans not yet returned.
    pub active_loans: usize,
    /// Active loans past their due date.
    pub overdue: usize,
    /// Fines charged on returned loans, in cents.
    pub fines_cents: u64,
}

/// What the dashboard shows, depending on who asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dashboard {
    /// Staff see the whole library.
    Staff(LibraryStats),
    /// Borrowers see their own loans.
    Member(MemberStats),
}

impl<S: RecordStore> Library<S> {
    /// Library-wide figures at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be read.
    pub fn library_stats(&self, now: DateTime<Utc>) -> Result<LibraryStats> {
        let active = self.list_active_loans(now)?;
        let reservations: Vec<Reservation> = self.store.get_all(Collection::Reservations)?;
        Ok(LibraryStats {
            total_books: self.books()?.len(),
            active_loans: active.len(),
            pending_reservations: reservations
                .iter()
                .filter(|r| r.status == ReservationStatus::Pending)
                .count(),
            overdue: active
                .iter()
                .filter(|r| r.status == BorrowStatus::Overdue)
                .count(),
        })
    }

    /// One member's figures at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the loan collection cannot be read.
    pub fn member_stats(&self, member_id: &str, now: DateTime<Utc>) -> Result<MemberStats> {
        let mut stats = MemberStats::default();
        for record in self.loans()?.iter().filter(|r| r.member_id == member_id) {
            match project_status(record, now) {
                BorrowStatus::Borrowed => stats.active_loans += 1,
                BorrowStatus::Overdue => {
                    stats.active_loans += 1;
                    stats.overdue += 1;
                }
                BorrowStatus::Returned => {
                    stats.fines_cents += record.fine_cents.unwrap_or(0);
                }
            }
        }
        Ok(stats)
    }

    /// The dashboard for `member_id`: library-wide for staff, personal otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::NotFound`] if the member does not exist.
    pub fn dashboard(&self, member_id: &str, now: DateTime<Utc>) -> Result<Dashboard> {
        let member = self
            .get_member(member_id)?
            .ok_or_else(|| LibraryError::not_found("member", member_id))?;
        if member.role.is_staff() {
            Ok(Dashboard::Staff(self.library_stats(now)?))
        } else {
            Ok(Dashboard::Member(self.member_stats(member_id, now)?))
        }
    }
}
