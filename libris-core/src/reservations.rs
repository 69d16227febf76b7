use crate::error::{LibraryError, Result};
use crate::model::{Book, Member, Reservation, ReservationStatus};
use crate::store::{Collection, RecordStore};
use crate::Library;
use chrono::{DateTime, Utc};
use log::info;
use uuid::Uuid;

impl<S: RecordStore> Library<S> {
    /// Every reservation, in the order they were placed.
    ///
    /// # Errors
    ///
    /// Returns an error if the reservation collection cannot be read.
    pub fn reservations(&self) -> Result<Vec<Reservation>> {
        self.store.get_all(Collection::Reservations)
    }

    /// Queues a pending reservation of `book_id` for `member_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::NotFound`] if the book or member does not exist.
    pub fn reserve_book(
        &mut self,
        book_id: &str,
        member_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Reservation> {
        let books: Vec<Book> = self.store.get_all(Collection::Books)?;
        if !books.iter().any(|b| b.id == book_id) {
            return Err(LibraryError::not_found("book", book_id));
        }
        let members: Vec<Member> = self.store.get_all(Collection::Members)?;
        if !members.iter().any(|m| m.id == member_id) {
            return Err(LibraryError::not_found("member", member_id));
        }

        let reservation = Reservation {
            id: Uuid::new_v4().to_string(),
            book_id: book_id.to_string(),
            member_id: member_id.to_string(),
            reservation_date: now,
            status: ReservationStatus::Pending,
        };
        let mut queue = self.reservations()?;
        queue.push(reservation.clone());
        self.store.set_all(Collection::Reservations, &queue)?;
        info!("Member '{member_id}' reserved book '{book_id}' as '{}'", reservation.id);
        Ok(reservation)
    }

    /// Moves a reservation to `status`. An unknown reservation answers `None`.
    ///
    /// Setting the status a reservation already has is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::InvalidTransition`] for a move the queue does not allow.
    pub fn set_reservation_status(
        &mut self,
        reservation_id: &str,
        status: ReservationStatus,
    ) -> Result<Option<Reservation>> {
        let mut queue = self.reservations()?;
        let Some(reservation) = queue.iter_mut().find(|r| r.id == reservation_id) else {
            return Ok(None);
        };
        if reservation.status == status {
            return Ok(Some(reservation.clone()));
        }
        if !reservation.status.can_transition_to(status) {
            return Err(LibraryError::InvalidTransition {
                from: reservation.status.to_string(),
                to: status.to_string(),
            });
        }
        let from = reservation.status;
        reservation.status = status;
        let updated = reservation.clone();
        self.store.set_all(Collection::Reservations, &queue)?;
        info!("Reservation '{reservation_id}' moved from {from} to {status}");
        Ok(Some(updated))
    }
}
