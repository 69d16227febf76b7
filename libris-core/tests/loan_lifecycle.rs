#![allow(missing_docs)]
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use libris_core::loans::{self, ReturnOutcome};
use libris_core::model::{Book, BorrowRecord, BorrowStatus, MemberDraft, Role};
use libris_core::store::{Collection, MemoryStore};
use libris_core::{Library, LibraryConfig, LibraryError, RecordStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::Cell;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

fn days(n: i64) -> TimeDelta {
    TimeDelta::days(n)
}

fn book(id: &str, total: u32, available: u32) -> Book {
    Book {
        id: id.to_string(),
        title: format!("Title of {id}"),
        author: "Author".to_string(),
        isbn: "978-0000000000".to_string(),
        category: "Fiction".to_string(),
        publish_year: None,
        description: None,
        location: None,
        total_copies: total,
        available_copies: available,
    }
}

fn member(email: &str) -> MemberDraft {
    MemberDraft {
        email: email.to_string(),
        name: email.split('@').next().unwrap().to_string(),
        role: Role::User,
        phone: None,
    }
}

/// A library holding the given books and two members, A and B.
fn library_with(books: &[Book]) -> (Library<MemoryStore>, String, String) {
    let mut store = MemoryStore::new();
    store.set_all(Collection::Books, books).unwrap();
    let mut library = Library::new(store, LibraryConfig::default());
    let a = library.add_member(member("a@user.com"), t0()).unwrap().id;
    let b = library.add_member(member("b@user.com"), t0()).unwrap().id;
    (library, a, b)
}

fn available(library: &Library<MemoryStore>, book_id: &str) -> u32 {
    library.get_book(book_id).unwrap().unwrap().available_copies
}

#[test]
fn test_scenario_last_copy_then_late_return() {
    let (mut library, a, b) = library_with(&[book("b1", 5, 1)]);

    let loan = library.issue_loan("b1", &a, None, t0()).unwrap();
    assert_eq!(loan.status, BorrowStatus::Borrowed);
    assert_eq!(loan.due_date, t0() + days(14));
    assert_eq!(available(&library, "b1"), 0);

    let refused = library.issue_loan("b1", &b, None, t0());
    assert!(matches!(refused, Err(LibraryError::Unavailable { .. })));

    let outcome = library.return_loan(&loan.id, t0() + days(16)).unwrap();
    let ReturnOutcome::Returned(returned) = outcome else {
        panic!("expected a fresh return, got {outcome:?}");
    };
    assert_eq!(returned.status, BorrowStatus::Returned);
    assert_eq!(returned.return_date, Some(t0() + days(16)));
    assert_eq!(returned.fine_cents, Some(100));
    assert_eq!(available(&library, "b1"), 1);
}

#[test]
fn test_issue_without_copies_leaves_state_unchanged() {
    let (mut library, a, _) = library_with(&[book("b1", 2, 0)]);
    let books_before = library.books().unwrap();
    let loans_before = library.loans().unwrap();

    let result = library.issue_loan("b1", &a, None, t0());
    assert!(matches!(result, Err(LibraryError::Unavailable { ref book_id }) if book_id == "b1"));
    assert_eq!(library.books().unwrap(), books_before);
    assert_eq!(library.loans().unwrap(), loans_before);
}

#[test]
fn test_issue_rejects_unknown_book_member_and_past_due_date() {
    let (mut library, a, _) = library_with(&[book("b1", 1, 1)]);

    assert!(matches!(
        library.issue_loan("nope", &a, None, t0()),
        Err(LibraryError::NotFound { kind: "book", .. })
    ));
    assert!(matches!(
        library.issue_loan("b1", "ghost", None, t0()),
        Err(LibraryError::NotFound { kind: "member", .. })
    ));
    assert!(matches!(
        library.issue_loan("b1", &a, Some(t0()), t0()),
        Err(LibraryError::InvalidDueDate)
    ));
    assert_eq!(available(&library, "b1"), 1);
    assert!(library.loans().unwrap().is_empty());
}

#[test]
fn test_explicit_due_date_is_kept() {
    let (mut library, a, _) = library_with(&[book("b1", 1, 1)]);
    let due = t0() + days(3);
    let loan = library.issue_loan("b1", &a, Some(due), t0()).unwrap();
    assert_eq!(loan.due_date, due);
}

#[test]
fn test_return_twice_is_idempotent() {
    let (mut library, a, _) = library_with(&[book("b1", 2, 2)]);
    let loan = library.issue_loan("b1", &a, None, t0()).unwrap();

    let first = library.return_loan(&loan.id, t0() + days(1)).unwrap();
    assert!(matches!(first, ReturnOutcome::Returned(_)));
    assert_eq!(available(&library, "b1"), 2);

    let second = library.return_loan(&loan.id, t0() + days(30)).unwrap();
    let ReturnOutcome::AlreadyReturned(record) = second else {
        panic!("expected a no-op, got {second:?}");
    };
    assert_eq!(record.return_date, Some(t0() + days(1)));
    assert_eq!(record.fine_cents, Some(0));
    assert_eq!(available(&library, "b1"), 2);
}

#[test]
fn test_return_of_unknown_loan_is_a_noop() {
    let (mut library, _, _) = library_with(&[book("b1", 1, 1)]);
    let outcome = library.return_loan("missing", t0()).unwrap();
    assert_eq!(outcome, ReturnOutcome::NotFound);
    assert_eq!(available(&library, "b1"), 1);
}

#[test]
fn test_return_never_raises_available_above_total() {
    let mut store = MemoryStore::new();
    store.set_all(Collection::Books, &[book("b1", 1, 1)]).unwrap();
    let stray = BorrowRecord {
        id: "r1".to_string(),
        book_id: "b1".to_string(),
        member_id: "m1".to_string(),
        borrow_date: t0(),
        due_date: t0() + days(14),
        return_date: None,
        status: BorrowStatus::Borrowed,
        fine_cents: None,
    };
    store.set_all(Collection::Loans, &[stray]).unwrap();
    let mut library = Library::new(store, LibraryConfig::default());

    let outcome = library.return_loan("r1", t0() + days(2)).unwrap();
    assert!(matches!(outcome, ReturnOutcome::Returned(_)));
    assert_eq!(available(&library, "b1"), 1);
}

#[test]
fn test_overdue_is_projected_not_persisted() {
    let (mut library, a, _) = library_with(&[book("b1", 1, 1)]);
    let loan = library.issue_loan("b1", &a, None, t0()).unwrap();
    let later = t0() + days(15);

    let active = library.list_active_loans(later).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].status, BorrowStatus::Overdue);

    let history = library.list_loans_for_member(&a, later).unwrap();
    assert_eq!(history[0].status, BorrowStatus::Overdue);
    assert_eq!(library.list_overdue_loans(later).unwrap().len(), 1);
    assert_eq!(
        library.get_loan(&loan.id, later).unwrap().unwrap().status,
        BorrowStatus::Overdue
    );

    let stored = library.loans().unwrap();
    assert_eq!(stored[0].status, BorrowStatus::Borrowed);

    // Exactly at the due date the loan is not yet overdue.
    let at_due = library.list_active_loans(loan.due_date).unwrap();
    assert_eq!(at_due[0].status, BorrowStatus::Borrowed);
}

#[test]
fn test_project_status_leaves_returned_alone() {
    let record = BorrowRecord {
        id: "r1".to_string(),
        book_id: "b1".to_string(),
        member_id: "m1".to_string(),
        borrow_date: t0(),
        due_date: t0() + days(1),
        return_date: Some(t0() + days(5)),
        status: BorrowStatus::Returned,
        fine_cents: Some(200),
    };
    assert_eq!(loans::project_status(&record, t0() + days(10)), BorrowStatus::Returned);
}

#[test]
fn test_fine_amounts() {
    let due = t0();
    assert_eq!(loans::compute_fine(due, due, 50), 0);
    assert_eq!(loans::compute_fine(due, due - days(2), 50), 0);
    assert_eq!(loans::compute_fine(due, due + days(1), 50), 50);
    assert_eq!(loans::compute_fine(due, due + days(3), 50), 150);
    assert_eq!(loans::compute_fine(due, due + TimeDelta::seconds(1), 50), 50);
    assert_eq!(loans::compute_fine(due, due + days(1) + TimeDelta::hours(1), 50), 100);
    assert_eq!(loans::format_cents(150), "1.50");
    assert_eq!(loans::format_cents(5), "0.05");
}

#[test]
fn test_on_time_return_has_zero_fine() {
    let (mut library, a, _) = library_with(&[book("b1", 1, 1)]);
    let loan = library.issue_loan("b1", &a, None, t0()).unwrap();
    let outcome = library.return_loan(&loan.id, loan.due_date).unwrap();
    let ReturnOutcome::Returned(record) = outcome else {
        panic!("expected a fresh return");
    };
    assert_eq!(record.fine_cents, Some(0));
}

#[test]
fn test_custom_fine_rate_and_loan_length() {
    let mut store = MemoryStore::new();
    store.set_all(Collection::Books, &[book("b1", 1, 1)]).unwrap();
    let mut config = LibraryConfig::default();
    config.loans.loan_days = 7;
    config.loans.fine_rate_cents = 25;
    let mut library = Library::new(store, config);
    let a = library.add_member(member("a@user.com"), t0()).unwrap().id;

    let loan = library.issue_loan("b1", &a, None, t0()).unwrap();
    assert_eq!(loan.due_date, t0() + days(7));
    let ReturnOutcome::Returned(record) = library.return_loan(&loan.id, t0() + days(10)).unwrap()
    else {
        panic!("expected a fresh return");
    };
    assert_eq!(record.fine_cents, Some(75));
}

#[test]
fn test_active_loans_sorted_soonest_due_first() {
    let (mut library, a, b) = library_with(&[book("b1", 3, 3), book("b2", 1, 1)]);
    let late = library.issue_loan("b1", &a, Some(t0() + days(20)), t0()).unwrap();
    let soon = library.issue_loan("b2", &b, Some(t0() + days(2)), t0()).unwrap();
    let middle = library.issue_loan("b1", &b, Some(t0() + days(9)), t0()).unwrap();
    let returned = library.issue_loan("b1", &a, Some(t0() + days(1)), t0()).unwrap();
    library.return_loan(&returned.id, t0()).unwrap();

    let ids: Vec<String> = library
        .list_active_loans(t0())
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![soon.id, middle.id, late.id]);
}

#[test]
fn test_member_history_most_recent_first() {
    let (mut library, a, b) = library_with(&[book("b1", 5, 5)]);
    let first = library.issue_loan("b1", &a, None, t0()).unwrap();
    let second = library.issue_loan("b1", &a, None, t0() + days(2)).unwrap();
    library.issue_loan("b1", &b, None, t0() + days(3)).unwrap();
    library.return_loan(&first.id, t0() + days(4)).unwrap();
    let third = library.issue_loan("b1", &a, None, t0() + days(5)).unwrap();

    let history = library.list_loans_for_member(&a, t0() + days(5)).unwrap();
    let ids: Vec<&str> = history.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![third.id.as_str(), second.id.as_str(), first.id.as_str()]);
    assert_eq!(history[2].status, BorrowStatus::Returned);
}

#[test]
fn test_copy_counts_stay_within_bounds() {
    let (mut library, a, b) = library_with(&[book("b1", 3, 3)]);
    let members = [a, b];
    let mut open: Vec<String> = Vec::new();
    let mut now = t0();

    for step in 0..40 {
        now += TimeDelta::hours(7);
        if step % 3 == 2 && !open.is_empty() {
            let id = open.remove(0);
            library.return_loan(&id, now).unwrap();
            // Returning again must not change anything.
            library.return_loan(&id, now).unwrap();
        } else {
            match library.issue_loan("b1", &members[step % 2], None, now) {
                Ok(loan) => open.push(loan.id),
                Err(LibraryError::Unavailable { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        let b1 = library.get_book("b1").unwrap().unwrap();
        assert!(b1.available_copies <= b1.total_copies);
        assert_eq!(b1.on_loan() as usize, open.len());
    }
}

#[test]
fn test_loan_views_resolve_titles_and_names() {
    let (mut library, a, _) = library_with(&[book("b1", 1, 1)]);
    library.issue_loan("b1", &a, None, t0()).unwrap();
    let views = library
        .loan_views(library.list_active_loans(t0()).unwrap())
        .unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].book_title.as_deref(), Some("Title of b1"));
    assert_eq!(views[0].member_name.as_deref(), Some("a"));
}

/// A memory store that can be told to fail reads or writes of one collection.
#[derive(Default)]
struct FailingStore {
    inner: MemoryStore,
    fail_read: Cell<Option<Collection>>,
    fail_write: Cell<Option<Collection>>,
}

fn store_failure(action: &str, collection: Collection) -> LibraryError {
    LibraryError::Io(std::io::Error::other(format!("{action} {collection} failed")))
}

impl RecordStore for FailingStore {
    fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> libris_core::Result<Vec<T>> {
        if self.fail_read.get() == Some(collection) {
            return Err(store_failure("reading", collection));
        }
        self.inner.get_all(collection)
    }

    fn set_all<T: Serialize>(&mut self, collection: Collection, items: &[T]) -> libris_core::Result<()> {
        if self.fail_write.get() == Some(collection) {
            return Err(store_failure("writing", collection));
        }
        self.inner.set_all(collection, items)
    }
}

fn failing_library(books: &[Book]) -> (Library<FailingStore>, String) {
    let mut store = FailingStore::default();
    store.set_all(Collection::Books, books).unwrap();
    let mut library = Library::new(store, LibraryConfig::default());
    let a = library.add_member(member("a@user.com"), t0()).unwrap().id;
    (library, a)
}

fn shelf(library: &Library<FailingStore>, book_id: &str) -> u32 {
    library.get_book(book_id).unwrap().unwrap().available_copies
}

#[test]
fn test_return_with_unreadable_books_can_be_retried() {
    let (mut library, a) = failing_library(&[book("b1", 1, 1)]);
    let loan = library.issue_loan("b1", &a, None, t0()).unwrap();
    assert_eq!(shelf(&library, "b1"), 0);

    library.store().fail_read.set(Some(Collection::Books));
    let failed = library.return_loan(&loan.id, t0() + days(2));
    assert!(matches!(failed, Err(LibraryError::Io(_))));
    library.store().fail_read.set(None);

    assert_eq!(
        library.get_loan(&loan.id, t0()).unwrap().unwrap().status,
        BorrowStatus::Borrowed
    );
    let retried = library.return_loan(&loan.id, t0() + days(2)).unwrap();
    assert!(matches!(retried, ReturnOutcome::Returned(_)));
    assert_eq!(shelf(&library, "b1"), 1);
}

#[test]
fn test_return_with_unwritable_books_reopens_the_loan() {
    let (mut library, a) = failing_library(&[book("b1", 1, 1)]);
    let loan = library.issue_loan("b1", &a, None, t0()).unwrap();

    library.store().fail_write.set(Some(Collection::Books));
    assert!(library.return_loan(&loan.id, t0() + days(2)).is_err());
    library.store().fail_write.set(None);

    let reopened = library.get_loan(&loan.id, t0()).unwrap().unwrap();
    assert_eq!(reopened.status, BorrowStatus::Borrowed);
    assert_eq!(reopened.return_date, None);
    assert_eq!(shelf(&library, "b1"), 0);

    let retried = library.return_loan(&loan.id, t0() + days(2)).unwrap();
    assert!(matches!(retried, ReturnOutcome::Returned(_)));
    assert_eq!(shelf(&library, "b1"), 1);
}

#[test]
fn test_failed_issue_leaves_no_trace() {
    let (mut library, a) = failing_library(&[book("b1", 1, 1)]);

    library.store().fail_write.set(Some(Collection::Books));
    assert!(library.issue_loan("b1", &a, None, t0()).is_err());
    library.store().fail_write.set(Some(Collection::Loans));
    assert!(library.issue_loan("b1", &a, None, t0()).is_err());
    library.store().fail_write.set(None);

    assert_eq!(shelf(&library, "b1"), 1);
    assert!(library.loans().unwrap().is_empty());
    library.issue_loan("b1", &a, None, t0()).unwrap();
    assert_eq!(shelf(&library, "b1"), 0);
    assert_eq!(library.loans().unwrap().len(), 1);
}
