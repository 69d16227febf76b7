#![allow(missing_docs)]
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use libris_core::model::{BookDraft, MemberDraft, ReservationStatus, Role};
use libris_core::stats::{Dashboard, LibraryStats, MemberStats};
use libris_core::store::MemoryStore;
use libris_core::{Library, LibraryConfig, LibraryError};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

struct Desk {
    library: Library<MemoryStore>,
    admin: String,
    jane: String,
    dune: String,
    emma: String,
}

fn desk() -> Desk {
    let mut library = Library::new(MemoryStore::new(), LibraryConfig::default());
    let mut add = |email: &str, role: Role| {
        library
            .add_member(
                MemberDraft {
                    email: email.to_string(),
                    name: email.to_string(),
                    role,
                    phone: None,
                },
                t0(),
            )
            .unwrap()
            .id
    };
    let admin = add("admin@library.com", Role::Admin);
    let jane = add("jane@user.com", Role::User);
    let mut book = |title: &str| {
        library
            .add_book(BookDraft {
                title: title.to_string(),
                author: "Someone".to_string(),
                isbn: "978-1".to_string(),
                category: "Fiction".to_string(),
                total_copies: 2,
                ..BookDraft::default()
            })
            .unwrap()
            .id
    };
    let dune = book("Dune");
    let emma = book("Emma");
    Desk {
        library,
        admin,
        jane,
        dune,
        emma,
    }
}

#[test]
fn test_reservation_starts_pending() {
    let mut d = desk();
    let reservation = d.library.reserve_book(&d.dune, &d.jane, t0()).unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert_eq!(reservation.reservation_date, t0());
    assert_eq!(d.library.reservations().unwrap(), vec![reservation]);
}

#[test]
fn test_reservation_requires_book_and_member() {
    let mut d = desk();
    assert!(matches!(
        d.library.reserve_book("missing", &d.jane, t0()),
        Err(LibraryError::NotFound { kind: "book", .. })
    ));
    assert!(matches!(
        d.library.reserve_book(&d.dune, "ghost", t0()),
        Err(LibraryError::NotFound { kind: "member", .. })
    ));
    assert!(d.library.reservations().unwrap().is_empty());
}

#[test]
fn test_reservation_transitions() {
    let mut d = desk();
    let id = d.library.reserve_book(&d.dune, &d.jane, t0()).unwrap().id;

    let approved = d
        .library
        .set_reservation_status(&id, ReservationStatus::Approved)
        .unwrap()
        .unwrap();
    assert_eq!(approved.status, ReservationStatus::Approved);

    let back = d.library.set_reservation_status(&id, ReservationStatus::Pending);
    assert!(matches!(back, Err(LibraryError::InvalidTransition { .. })));

    let fulfilled = d
        .library
        .set_reservation_status(&id, ReservationStatus::Fulfilled)
        .unwrap()
        .unwrap();
    assert_eq!(fulfilled.status, ReservationStatus::Fulfilled);

    // Re-applying the current status changes nothing.
    let same = d
        .library
        .set_reservation_status(&id, ReservationStatus::Fulfilled)
        .unwrap();
    assert_eq!(same.map(|r| r.status), Some(ReservationStatus::Fulfilled));

    assert!(
        d.library
            .set_reservation_status("missing", ReservationStatus::Approved)
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_reservation_status_rules() {
    use ReservationStatus::{Approved, Fulfilled, Pending, Rejected};
    assert!(Pending.can_transition_to(Approved));
    assert!(Pending.can_transition_to(Rejected));
    assert!(Approved.can_transition_to(Fulfilled));
    assert!(Approved.can_transition_to(Rejected));
    assert!(!Pending.can_transition_to(Fulfilled));
    assert!(!Rejected.can_transition_to(Approved));
    assert!(!Fulfilled.can_transition_to(Pending));
    assert_eq!("approved".parse::<ReservationStatus>(), Ok(Approved));
}

#[test]
fn test_library_stats_count_projected_overdue() {
    let mut d = desk();
    d.library
        .issue_loan(&d.dune, &d.jane, Some(t0() + TimeDelta::days(2)), t0())
        .unwrap();
    d.library.issue_loan(&d.emma, &d.jane, None, t0()).unwrap();
    d.library.reserve_book(&d.dune, &d.jane, t0()).unwrap();
    let rejected = d.library.reserve_book(&d.emma, &d.jane, t0()).unwrap();
    d.library
        .set_reservation_status(&rejected.id, ReservationStatus::Rejected)
        .unwrap();

    let stats = d.library.library_stats(t0() + TimeDelta::days(5)).unwrap();
    assert_eq!(
        stats,
        LibraryStats {
            total_books: 2,
            active_loans: 2,
            pending_reservations: 1,
            overdue: 1,
        }
    );
}

#[test]
fn test_member_stats_include_fines() {
    let mut d = desk();
    let late = d.library.issue_loan(&d.dune, &d.jane, None, t0()).unwrap();
    d.library.issue_loan(&d.emma, &d.jane, None, t0()).unwrap();
    d.library
        .return_loan(&late.id, t0() + TimeDelta::days(17))
        .unwrap();

    let stats = d.library.member_stats(&d.jane, t0() + TimeDelta::days(20)).unwrap();
    assert_eq!(
        stats,
        MemberStats {
            active_loans: 1,
            overdue: 1,
            fines_cents: 150,
        }
    );
}

#[test]
fn test_dashboard_depends_on_role() {
    let mut d = desk();
    d.library.issue_loan(&d.dune, &d.jane, None, t0()).unwrap();

    match d.library.dashboard(&d.admin, t0()).unwrap() {
        Dashboard::Staff(stats) => assert_eq!(stats.active_loans, 1),
        Dashboard::Member(_) => panic!("admins see library-wide figures"),
    }
    match d.library.dashboard(&d.jane, t0()).unwrap() {
        Dashboard::Member(stats) => assert_eq!(stats.active_loans, 1),
        Dashboard::Staff(_) => panic!("borrowers see their own figures"),
    }
    assert!(d.library.dashboard("ghost", t0()).is_err());
}
