use crate::error::{LibraryError, Result};
use crate::model::{Book, BookDraft};
use crate::store::{Collection, RecordStore};
use crate::Library;
use log::info;
use uuid::Uuid;

impl<S: RecordStore> Library<S> {
    /// Every catalogued book.
    ///
    /// # Errors
    ///
    /// Returns an error if the book collection cannot be read.
    pub fn books(&self) -> Result<Vec<Book>> {
        self.store.get_all(Collection::Books)
    }

    /// Looks up a book by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the book collection cannot be read.
    pub fn get_book(&self, book_id: &str) -> Result<Option<Book>> {
        Ok(self.books()?.into_iter().find(|b| b.id == book_id))
    }

    /// Books whose title, author, category or ISBN contains `term`, ignoring
    /// case. An empty term matches everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the book collection cannot be read.
    pub fn search_books(&self, term: &str) -> Result<Vec<Book>> {
        let needle = term.trim().to_lowercase();
        Ok(self
            .books()?
            .into_iter()
            .filter(|b| {
                b.title.to_lowercase().contains(&needle)
                    || b.author.to_lowercase().contains(&needle)
                    || b.category.to_lowercase().contains(&needle)
                    || b.isbn.to_lowercase().contains(&needle)
            })
            .collect())
    }

    /// Catalogues a new book with every copy on the shelf.
    ///
    /// # Errors
    ///
    /// Returns an error if the book collection cannot be read or written.
    pub fn add_book(&mut self, draft: BookDraft) -> Result<Book> {
        let mut books = self.books()?;
        let book = Book {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            author: draft.author,
            isbn: draft.isbn,
            category: draft.category,
            publish_year: draft.publish_year,
            description: draft.description,
            location: draft.location,
            total_copies: draft.total_copies,
            available_copies: draft.total_copies,
        };
        books.push(book.clone());
        self.store.set_all(Collection::Books, &books)?;
        info!("Catalogued '{}' as book '{}' with {} copies", book.title, book.id, book.total_copies);
        Ok(book)
    }

    /// Replaces a book's details.
    ///
    /// Copies already lent out stay lent out: the shelf count becomes the new
    /// total minus the copies on loan.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] if the book does not exist.
    /// - [`LibraryError::InvalidCopyCount`] if the new total is below the copies on loan.
    pub fn update_book(&mut self, book_id: &str, draft: BookDraft) -> Result<Book> {
        let mut books = self.books()?;
        let book = books
            .iter_mut()
            .find(|b| b.id == book_id)
            .ok_or_else(|| LibraryError::not_found("book", book_id))?;

        let on_loan = book.on_loan();
        if draft.total_copies < on_loan {
            return Err(LibraryError::InvalidCopyCount {
                book_id: book_id.to_string(),
                requested: draft.total_copies,
                on_loan,
            });
        }

        book.title = draft.title;
        book.author = draft.author;
        book.isbn = draft.isbn;
        book.category = draft.category;
        book.publish_year = draft.publish_year;
        book.description = draft.description;
        book.location = draft.location;
        book.total_copies = draft.total_copies;
        book.available_copies = draft.total_copies - on_loan;
        let updated = book.clone();

        self.store.set_all(Collection::Books, &books)?;
        info!("Updated book '{book_id}' ({on_loan} copies on loan)");
        Ok(updated)
    }

    /// Removes a book from the catalog. Removing an unknown book is a no-op
    /// answering `false`.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::CopiesOnLoan`] while any copy is lent out.
    pub fn delete_book(&mut self, book_id: &str) -> Result<bool> {
        let mut books = self.books()?;
        let Some(idx) = books.iter().position(|b| b.id == book_id) else {
            return Ok(false);
        };
        let on_loan = books[idx].on_loan();
        if on_loan > 0 {
            return Err(LibraryError::CopiesOnLoan {
                book_id: book_id.to_string(),
                on_loan,
            });
        }
        books.remove(idx);
        self.store.set_all(Collection::Books, &books)?;
        info!("Removed book '{book_id}' from the catalog");
        Ok(true)
    }
}
