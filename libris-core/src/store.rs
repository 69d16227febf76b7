use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// The record collections a library keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// [`crate::model::Book`] records.
    Books,
    /// [`crate::model::Member`] records.
    Members,
    /// [`crate::model::BorrowRecord`] records.
    Loans,
    /// [`crate::model::Reservation`] records.
    Reservations,
}

impl Collection {
    /// Every collection, in a stable order.
    pub const ALL: [Self; 4] = [Self::Books, Self::Members, Self::Loans, Self::Reservations];

    /// The opaque key the collection is stored under.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Books => "books",
            Self::Members => "members",
            Self::Loans => "loans",
            Self::Reservations => "reservations",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Replace-whole-collection persistence.
///
/// Readers get the full collection; writers hand back the full collection.
/// The last write wins.
pub trait RecordStore {
    /// Reads every record of `collection`. A collection never written reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored data cannot be read or decoded.
    fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>>;

    /// Replaces the whole of `collection` with `items`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be encoded or written.
    fn set_all<T: Serialize>(&mut self, collection: Collection, items: &[T]) -> Result<()>;
}

/// Keeps each collection as serialized JSON text in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: HashMap<Collection, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        match self.collections.get(&collection) {
            Some(data) => Ok(serde_json::from_str(data)?),
            None => Ok(Vec::new()),
        }
    }

    fn set_all<T: Serialize>(&mut self, collection: Collection, items: &[T]) -> Result<()> {
        let data = serde_json::to_string(items)?;
        self.collections.insert(collection, data);
        Ok(())
    }
}

/// Keeps each collection in `<key>.json` inside a library directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Opens the library directory at `root`. Nothing is read until asked.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the library directory and writes every collection empty.
    ///
    /// Existing collection files are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a collection file cannot be created.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::open(root);
        fs::create_dir_all(&store.root)?;
        for collection in Collection::ALL {
            if !store.path_for(collection).exists() {
                store.set_all::<serde_json::Value>(collection, &[])?;
            }
        }
        Ok(store)
    }

    /// The library directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.root.join(format!("{}.json", collection.key()))
    }
}

impl RecordStore for JsonDirStore {
    fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        let path = self.path_for(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn set_all<T: Serialize>(&mut self, collection: Collection, items: &[T]) -> Result<()> {
        let data = serde_json::to_string_pretty(items)?;
        fs::write(self.path_for(collection), data)?;
        Ok(())
    }
}
