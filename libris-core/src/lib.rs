// File:    lib.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: The main library crate for libris-core, orchestrating loans, fines, the catalog, members and two-factor login.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! # Libris Core Library
//!
//! This library provides the circulation desk of a small lending library:
//! book availability, loan issuance and return with overdue fines, member
//! administration, reservations, and TOTP-based two-factor login.
//!
//! Every service hangs off [`Library`], which exclusively owns a
//! [`store::RecordStore`] and the [`config::LibraryConfig`] in effect.

/// Two-factor login on top of the member directory.
pub mod auth;
/// Book catalog management.
pub mod catalog;
/// Library-wide configuration: TOTP settings and loan policy.
pub mod config;
/// The error type shared by every service.
pub mod error;
/// The loan lifecycle engine: issue, return, fines and projected status.
pub mod loans;
/// Member directory management.
pub mod members;
/// Plain records persisted by the store.
pub mod model;
/// Reservation queue.
pub mod reservations;
/// Dashboard statistics.
pub mod stats;
/// Replace-whole-collection record persistence.
pub mod store;
/// Time-based one-time passwords (RFC 6238).
pub mod totp;

pub use config::LibraryConfig;
pub use error::{LibraryError, Result};
pub use store::RecordStore;

/// A lending library backed by a record store.
///
/// `Library` is the single owner of its store; every mutating operation is a
/// read-modify-write that runs to completion before the next one starts.
#[derive(Debug)]
pub struct Library<S: RecordStore> {
    store: S,
    config: LibraryConfig,
}

impl<S: RecordStore> Library<S> {
    /// Opens a library over `store` with the given configuration.
    pub const fn new(store: S, config: LibraryConfig) -> Self {
        Self { store, config }
    }

    /// The configuration in effect.
    pub const fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Borrows the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the library and hands back its store.
    pub fn into_store(self) -> S {
        self.store
    }
}
