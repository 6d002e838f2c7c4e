use anyhow::{Result, Context};
use rand::{thread_rng, Rng};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// A value that can be loaded from a single field of an identity list
pub trait PoolEntry: Sized {
    /// Parse one single-field record
    fn from_record(field: &str) -> Result<Self>;
}

/// Ordered collection of identities with a shared round-robin cursor
///
/// Entries are only added through `&mut self`, so once the pool is shared
/// between workers its length is fixed and the cursor stays in `[0, len)`.
#[derive(Debug)]
pub struct IdentityPool<T> {
    /// Entries in file order
    entries: Vec<T>,

    /// Position handed out by the next `get`
    cursor: AtomicUsize,
}

impl<T> Default for IdentityPool<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            cursor: AtomicUsize::new(0),
        }
    }
}

impl<T: PoolEntry> IdentityPool<T> {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool holding the given entries, cursor at the first one
    pub fn from_entries(entries: Vec<T>) -> Self {
        Self {
            entries,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Create a pool from a list file
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut pool = Self::new();
        pool.add_from_file(path)?;
        Ok(pool)
    }

    /// Append every well-formed record of a list file to the pool
    ///
    /// Records with a field count other than one are skipped. Failing to
    /// open or read the file, or to parse a well-formed record, aborts.
    pub fn add_from_file(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)
            .context(format!("Failed to open identity list: {}", path.display()))?;

        self.add_from_reader(file)
            .context(format!("Failed to load identity list: {}", path.display()))
    }

    fn add_from_reader<R: Read>(&mut self, source: R) -> Result<()> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(source);

        let mut added = 0usize;
        let mut skipped = 0usize;

        for record in reader.records() {
            let record = record.context("Failed to read identity record")?;

            if record.len() != 1 {
                skipped += 1;
                continue;
            }

            self.entries.push(T::from_record(&record[0])?);
            added += 1;
        }

        debug!("Loaded {} identities ({} malformed records skipped)", added, skipped);

        Ok(())
    }

    /// Take the entry under the cursor and advance it, wrapping at the end
    pub fn get(&self) -> Option<&T> {
        let len = self.entries.len();
        if len == 0 {
            return None;
        }

        let position = self.cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                Some(if cursor + 1 >= len { 0 } else { cursor + 1 })
            })
            .unwrap_or_else(|cursor| cursor);

        self.entries.get(position % len)
    }

    /// Pick a uniformly random entry
    pub fn get_random(&self) -> Option<&T> {
        if self.entries.is_empty() {
            return None;
        }

        let mut rng = thread_rng();
        self.entries.get(rng.gen_range(0..self.entries.len()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
