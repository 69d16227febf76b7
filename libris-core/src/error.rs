//! Errors raised by the library services.
//!
//! A TOTP mismatch is not an error: verification answers with a `bool` and
//! leaves the decision to the caller.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Everything that can go wrong while serving a library request.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The book has no copy left to lend.
    #[error("Book '{book_id}' has no available copies")]
    Unavailable {
        /// The requested book.
        book_id: String,
    },

    /// A referenced record does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// The kind of record, e.g. "book" or "member".
        kind: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// Another member already uses this email address.
    #[error("A member with email '{0}' already exists")]
    DuplicateEmail(String),

    /// The requested due date is not after the issue time.
    #[error("Due date must be after the time of issue")]
    InvalidDueDate,

    /// A new copy count cannot cover the copies currently lent out.
    #[error("Book '{book_id}' cannot have {requested} copies while {on_loan} are on loan")]
    InvalidCopyCount {
        /// The book being edited.
        book_id: String,
        /// The total copy count asked for.
        requested: u32,
        /// Copies currently lent out.
        on_loan: u32,
    },

    /// The book still has copies lent out.
    #[error("Book '{book_id}' still has {on_loan} copies on loan")]
    CopiesOnLoan {
        /// The book being removed.
        book_id: String,
        /// Copies currently lent out.
        on_loan: u32,
    },

    /// The member still holds active loans.
    #[error("Member '{member_id}' still holds {active} active loans")]
    MemberHasLoans {
        /// The member being removed.
        member_id: String,
        /// Loans not yet returned.
        active: usize,
    },

    /// A reservation cannot move between these two states.
    #[error("Reservation cannot move from {from} to {to}")]
    InvalidTransition {
        /// The current state.
        from: String,
        /// The requested state.
        to: String,
    },

    /// A setting in `config.json` is out of range.
    #[error("Invalid library config: {0}")]
    InvalidConfig(String),

    /// The operating system refused to provide randomness.
    #[error("Failed to gather entropy: {0}")]
    Entropy(String),

    /// Reading or writing the record store failed.
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored collection could not be (de)serialized.
    #[error("Store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl LibraryError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}
