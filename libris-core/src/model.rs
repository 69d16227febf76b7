use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A title held by the library, with its copy counts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// A unique identifier for the book.
    pub id: String,
    /// The book's title.
    pub title: String,
    /// The book's author.
    pub author: String,
    /// The ISBN as printed.
    pub isbn: String,
    /// Shelf category, e.g. "Fiction".
    pub category: String,
    /// Year of publication, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<u16>,
    /// Free-form blurb.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Shelf location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Copies owned by the library.
    pub total_copies: u32,
    /// Copies on the shelf right now. Never exceeds `total_copies`.
    pub available_copies: u32,
}

impl Book {
    /// Number of copies currently lent out.
    #[must_use]
    pub const fn on_loan(&self) -> u32 {
        self.total_copies.saturating_sub(self.available_copies)
    }

    /// Whether at least one copy can be lent.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.available_copies > 0
    }
}

/// The editable part of a [`Book`], used for both adding and editing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDraft {
    /// The book's title.
    pub title: String,
    /// The book's author.
    pub author: String,
    /// The ISBN as printed.
    pub isbn: String,
    /// Shelf category.
    pub category: String,
    /// Year of publication.
    pub publish_year: Option<u16>,
    /// Free-form blurb.
    pub description: Option<String>,
    /// Shelf location.
    pub location: Option<String>,
    /// Copies owned by the library.
    pub total_copies: u32,
}

/// Lifecycle state of a loan.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BorrowStatus {
    /// Lent out and not yet due.
    Borrowed,
    /// Lent out past its due date. Only ever produced by projection.
    Overdue,
    /// Handed back. Terminal.
    Returned,
}

impl fmt::Display for BorrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Borrowed => "BORROWED",
            Self::Overdue => "OVERDUE",
            Self::Returned => "RETURNED",
        };
        f.pad(label)
    }
}

/// A single loan of one copy of a book to one member.
///
/// Only foreign keys are stored; titles and names are resolved when the
/// record is displayed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecord {
    /// A unique identifier for the loan.
    pub id: String,
    /// The lent book.
    pub book_id: String,
    /// The borrowing member.
    pub member_id: String,
    /// When the copy left the desk.
    pub borrow_date: DateTime<Utc>,
    /// When the copy is expected back.
    pub due_date: DateTime<Utc>,
    /// When the copy came back, once it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<DateTime<Utc>>,
    /// Persisted status: `Borrowed` or `Returned`.
    pub status: BorrowStatus,
    /// Fine charged at return, in cents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fine_cents: Option<u64>,
}

impl BorrowRecord {
    /// Whether the loan has reached its terminal state.
    #[must_use]
    pub fn is_returned(&self) -> bool {
        self.status == BorrowStatus::Returned
    }
}

/// Access level of a member.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full control over the library.
    Admin,
    /// Runs the circulation desk.
    Librarian,
    /// An ordinary borrower.
    #[default]
    User,
    /// Browse-only visitor.
    Guest,
}

impl Role {
    /// Admins and librarians see library-wide figures and manage the desk.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Admin | Self::Librarian)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Admin => "ADMIN",
            Self::Librarian => "LIBRARIAN",
            Self::User => "USER",
            Self::Guest => "GUEST",
        };
        f.pad(label)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "librarian" => Ok(Self::Librarian),
            "user" => Ok(Self::User),
            "guest" => Ok(Self::Guest),
            other => Err(format!(
                "unknown role '{other}' (expected admin, librarian, user or guest)"
            )),
        }
    }
}

/// A registered member of the library.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// A unique identifier for the member.
    pub id: String,
    /// Login identifier. Unique, compared case-insensitively.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Access level.
    pub role: Role,
    /// Contact number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// When the member joined.
    pub joined_date: DateTime<Utc>,
    /// Whether login requires a TOTP code.
    #[serde(default)]
    pub two_factor_enabled: bool,
    /// Base-32 TOTP secret. Present exactly when two-factor is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_factor_secret: Option<String>,
}

/// The editable part of a [`Member`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberDraft {
    /// Login identifier.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Access level.
    pub role: Role,
    /// Contact number.
    pub phone: Option<String>,
}

/// Where a reservation stands in the approval queue.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Waiting for staff.
    Pending,
    /// Accepted; the member will be served when a copy frees up.
    Approved,
    /// Declined.
    Rejected,
    /// The member has received the book.
    Fulfilled,
}

impl ReservationStatus {
    /// Whether a reservation may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Fulfilled | Self::Rejected)
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Fulfilled => "FULFILLED",
        };
        f.pad(label)
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "fulfilled" => Ok(Self::Fulfilled),
            other => Err(format!("unknown reservation status '{other}'")),
        }
    }
}

/// A member's request to borrow a book once staff approve it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    /// A unique identifier for the reservation.
    pub id: String,
    /// The requested book.
    pub book_id: String,
    /// The requesting member.
    pub member_id: String,
    /// When the request was placed.
    pub reservation_date: DateTime<Utc>,
    /// Current queue state.
    pub status: ReservationStatus,
}
