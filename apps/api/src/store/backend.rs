//! Row-oriented table seam. The store only ever talks to a [`TableBackend`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::store::StoreError;

/// A remote table addressed like a spreadsheet: 1-based rows and columns,
/// row 1 is the header.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Returns every row, header included. Trailing empty cells may be omitted.
    async fn read_all(&self) -> Result<Vec<Vec<String>>, StoreError>;

    async fn read_header(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read_all().await?.into_iter().next().unwrap_or_default())
    }

    async fn append_row(&self, row: Vec<String>) -> Result<(), StoreError>;

    /// Overwrites consecutive cells of `row`, starting at `first_col`, in one write.
    async fn update_cells(
        &self,
        row: usize,
        first_col: usize,
        values: Vec<String>,
    ) -> Result<(), StoreError>;

    async fn delete_row(&self, row: usize) -> Result<(), StoreError>;
}

/// In-process table used for local development (`CAREEROS_TABLE_BACKEND=memory`) and tests.
#[derive(Default)]
pub struct MemoryTable {
    rows: Mutex<Vec<Vec<String>>>,
    unreachable: AtomicBool,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Mutex::new(rows),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Simulates a connectivity failure on every subsequent call.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<Vec<String>> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Vec<String>>> {
        // A poisoned lock only means a test thread panicked mid-write; the rows are still usable.
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory table marked unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TableBackend for MemoryTable {
    async fn read_all(&self) -> Result<Vec<Vec<String>>, StoreError> {
        self.check_reachable()?;
        Ok(self.lock().clone())
    }

    async fn append_row(&self, row: Vec<String>) -> Result<(), StoreError> {
        self.check_reachable()?;
        self.lock().push(row);
        Ok(())
    }

    async fn update_cells(
        &self,
        row: usize,
        first_col: usize,
        values: Vec<String>,
    ) -> Result<(), StoreError> {
        self.check_reachable()?;
        if row == 0 || first_col == 0 {
            return Err(StoreError::Malformed("rows and columns are 1-based".into()));
        }
        let mut rows = self.lock();
        if rows.len() < row {
            rows.resize_with(row, Vec::new);
        }
        let target = &mut rows[row - 1];
        let needed = first_col - 1 + values.len();
        if target.len() < needed {
            target.resize(needed, String::new());
        }
        for (offset, value) in values.into_iter().enumerate() {
            target[first_col - 1 + offset] = value;
        }
        Ok(())
    }

    async fn delete_row(&self, row: usize) -> Result<(), StoreError> {
        self.check_reachable()?;
        let mut rows = self.lock();
        if row == 0 || row > rows.len() {
            return Err(StoreError::Malformed(format!("row {row} out of range")));
        }
        rows.remove(row - 1);
        Ok(())
    }
}
