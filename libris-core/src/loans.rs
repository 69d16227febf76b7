//! The loan lifecycle.
//!
//! A loan is persisted as `Borrowed` until it is returned, then `Returned`
//! forever. `Overdue` is never written: every read path derives it with
//! [`project_status`] from the due date and the current time.

use crate::error::{LibraryError, Result};
use crate::model::{Book, BorrowRecord, BorrowStatus, Member};
use crate::store::{Collection, RecordStore};
use crate::Library;
use chrono::{DateTime, TimeDelta, Utc};
use log::{error, info, warn};
use uuid::Uuid;

/// Result of handing a copy back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// The loan is now closed; carries the updated record and its fine.
    Returned(BorrowRecord),
    /// The loan had already been closed; nothing changed.
    AlreadyReturned(BorrowRecord),
    /// No loan has this identifier; nothing changed.
    NotFound,
}

/// A loan joined with the display data it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanView {
    /// The loan, with its projected status.
    pub record: BorrowRecord,
    /// Title of the lent book, if it is still catalogued.
    pub book_title: Option<String>,
    /// Name of the borrower, if they are still a member.
    pub member_name: Option<String>,
}

/// The status a record has at `now`.
///
/// A `Borrowed` record past its due date reads as `Overdue`; everything else
/// reads as stored.
#[must_use]
pub fn project_status(record: &BorrowRecord, now: DateTime<Utc>) -> BorrowStatus {
    match record.status {
        BorrowStatus::Borrowed if now > record.due_date => BorrowStatus::Overdue,
        status => status,
    }
}

/// The fine, in cents, for a copy due at `due` and returned at `returned`.
///
/// Every started day past the due date costs `rate_cents`. Returning on or
/// before the due date costs nothing.
#[must_use]
pub fn compute_fine(due: DateTime<Utc>, returned: DateTime<Utc>, rate_cents: u64) -> u64 {
    let late = returned - due;
    if late <= TimeDelta::zero() {
        return 0;
    }
    let whole_days = late.num_days();
    let started_days = match TimeDelta::try_days(whole_days) {
        Some(whole) if late > whole => whole_days + 1,
        _ => whole_days,
    };
    u64::try_from(started_days)
        .unwrap_or(0)
        .saturating_mul(rate_cents)
}

/// Formats an amount in cents as `units.cents`, e.g. `1.50`.
#[must_use]
pub fn format_cents(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

fn projected(record: &BorrowRecord, now: DateTime<Utc>) -> BorrowRecord {
    let mut view = record.clone();
    view.status = project_status(record, now);
    view
}

impl<S: RecordStore> Library<S> {
    /// Every loan as persisted, without status projection.
    ///
    /// # Errors
    ///
    /// Returns an error if the loan collection cannot be read.
    pub fn loans(&self) -> Result<Vec<BorrowRecord>> {
        self.store.get_all(Collection::Loans)
    }

    /// Looks up one loan, with its projected status.
    ///
    /// # Errors
    ///
    /// Returns an error if the loan collection cannot be read.
    pub fn get_loan(&self, record_id: &str, now: DateTime<Utc>) -> Result<Option<BorrowRecord>> {
        Ok(self
            .loans()?
            .iter()
            .find(|r| r.id == record_id)
            .map(|r| projected(r, now)))
    }

    /// Lends one copy of `book_id` to `member_id`.
    ///
    /// Without an explicit `due`, the loan runs for the policy's `loan_days`.
    /// Every check runs before anything is written, so a refused issue leaves
    /// the store untouched. The loan is written before the book's new count;
    /// if the book write fails the loan is withdrawn again.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] if the book or member does not exist.
    /// - [`LibraryError::Unavailable`] if no copy is on the shelf.
    /// - [`LibraryError::InvalidDueDate`] if `due` is not after `now`.
    pub fn issue_loan(
        &mut self,
        book_id: &str,
        member_id: &str,
        due: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<BorrowRecord> {
        let mut books: Vec<Book> = self.store.get_all(Collection::Books)?;
        let idx = books
            .iter()
            .position(|b| b.id == book_id)
            .ok_or_else(|| LibraryError::not_found("book", book_id))?;
        if !books[idx].is_available() {
            return Err(LibraryError::Unavailable {
                book_id: book_id.to_string(),
            });
        }

        let members: Vec<Member> = self.store.get_all(Collection::Members)?;
        if !members.iter().any(|m| m.id == member_id) {
            return Err(LibraryError::not_found("member", member_id));
        }

        let due_date = match due {
            Some(due) => due,
            None => TimeDelta::try_days(self.config.loans.loan_days)
                .and_then(|loan| now.checked_add_signed(loan))
                .ok_or(LibraryError::InvalidDueDate)?,
        };
        if due_date <= now {
            return Err(LibraryError::InvalidDueDate);
        }
        let before = self.loans()?;

        books[idx].available_copies -= 1;
        let remaining = books[idx].available_copies;
        let record = BorrowRecord {
            id: Uuid::new_v4().to_string(),
            book_id: book_id.to_string(),
            member_id: member_id.to_string(),
            borrow_date: now,
            due_date,
            return_date: None,
            status: BorrowStatus::Borrowed,
            fine_cents: None,
        };
        let mut records = before.clone();
        records.push(record.clone());
        self.commit_loans(&before, &records, Some(books.as_slice()))?;

        info!(
            "Issued book '{book_id}' to member '{member_id}' as loan '{}', due {due_date} ({remaining} copies left)",
            record.id
        );
        Ok(record)
    }

    /// Closes a loan, stamps the return time and charges any fine.
    ///
    /// Returning twice is a no-op, as is returning an unknown loan. The book's
    /// available count is raised by one but never above its total. Both
    /// collections are read before either is written, and a failed book write
    /// reopens the loan so the return can be retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn return_loan(&mut self, record_id: &str, now: DateTime<Utc>) -> Result<ReturnOutcome> {
        let mut records = self.loans()?;
        let Some(idx) = records.iter().position(|r| r.id == record_id) else {
            info!("Return requested for unknown loan '{record_id}', nothing to do");
            return Ok(ReturnOutcome::NotFound);
        };
        if records[idx].is_returned() {
            info!("Loan '{record_id}' was already returned, nothing to do");
            return Ok(ReturnOutcome::AlreadyReturned(records[idx].clone()));
        }
        let mut books: Vec<Book> = self.store.get_all(Collection::Books)?;
        let before = records.clone();

        let record = &mut records[idx];
        let fine = compute_fine(record.due_date, now, self.config.loans.fine_rate_cents);
        record.status = BorrowStatus::Returned;
        record.return_date = Some(now);
        record.fine_cents = Some(fine);
        let returned = record.clone();

        let shelved = match books.iter_mut().find(|b| b.id == returned.book_id) {
            Some(book) if book.available_copies < book.total_copies => {
                book.available_copies += 1;
                true
            }
            Some(book) => {
                warn!(
                    "Book '{}' already has all {} copies on the shelf; not raising its count",
                    book.id, book.total_copies
                );
                false
            }
            None => {
                warn!(
                    "Loan '{record_id}' refers to book '{}' which is no longer catalogued",
                    returned.book_id
                );
                false
            }
        };
        self.commit_loans(&before, &records, shelved.then_some(books.as_slice()))?;

        info!(
            "Returned loan '{record_id}' with a fine of {}",
            format_cents(fine)
        );
        Ok(ReturnOutcome::Returned(returned))
    }

    /// Writes the loan collection, then `books` if given.
    ///
    /// A failed book write puts the loans back as they were, so the two
    /// collections never disagree about a copy.
    fn commit_loans(
        &mut self,
        before: &[BorrowRecord],
        after: &[BorrowRecord],
        books: Option<&[Book]>,
    ) -> Result<()> {
        self.store.set_all(Collection::Loans, after)?;
        let Some(books) = books else {
            return Ok(());
        };
        if let Err(e) = self.store.set_all(Collection::Books, books) {
            if let Err(restore) = self.store.set_all(Collection::Loans, before) {
                error!("Failed to restore loans after a failed book write: {restore}");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Loans still out, soonest due first.
    ///
    /// # Errors
    ///
    /// Returns an error if the loan collection cannot be read.
    pub fn list_active_loans(&self, now: DateTime<Utc>) -> Result<Vec<BorrowRecord>> {
        let mut active: Vec<BorrowRecord> = self
            .loans()?
            .iter()
            .filter(|r| !r.is_returned())
            .map(|r| projected(r, now))
            .collect();
        active.sort_by_key(|r| r.due_date);
        Ok(active)
    }

    /// Loans still out and past their due date, soonest due first.
    ///
    /// # Errors
    ///
    /// Returns an error if the loan collection cannot be read.
    pub fn list_overdue_loans(&self, now: DateTime<Utc>) -> Result<Vec<BorrowRecord>> {
        let mut overdue = self.list_active_loans(now)?;
        overdue.retain(|r| r.status == BorrowStatus::Overdue);
        Ok(overdue)
    }

    /// Every loan a member ever took, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the loan collection cannot be read.
    pub fn list_loans_for_member(
        &self,
        member_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<BorrowRecord>> {
        let mut history: Vec<BorrowRecord> = self
            .loans()?
            .iter()
            .filter(|r| r.member_id == member_id)
            .map(|r| projected(r, now))
            .collect();
        history.sort_by(|a, b| b.borrow_date.cmp(&a.borrow_date));
        Ok(history)
    }

    /// Resolves book titles and member names for display.
    ///
    /// # Errors
    ///
    /// Returns an error if the book or member collection cannot be read.
    pub fn loan_views(&self, records: Vec<BorrowRecord>) -> Result<Vec<LoanView>> {
        let books: Vec<Book> = self.store.get_all(Collection::Books)?;
        let members: Vec<Member> = self.store.get_all(Collection::Members)?;
        Ok(records
            .into_iter()
            .map(|record| {
                let book_title = books
                    .iter()
                    .find(|b| b.id == record.book_id)
                    .map(|b| b.title.clone());
                let member_name = members
                    .iter()
                    .find(|m| m.id == record.member_id)
                    .map(|m| m.name.clone());
                LoanView {
                    record,
                    book_title,
                    member_name,
                }
            })
            .collect())
    }
}
