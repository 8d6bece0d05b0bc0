//! Remote table store: accomplishments kept in a shared spreadsheet.
//!
//! Every write is a separate network call with no transaction or rollback.
//! Rows are scoped to their owning `user` in this layer; the table itself
//! enforces nothing.

pub mod backend;
pub mod models;
pub mod sheets;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::backend::TableBackend;
use crate::store::models::{
    parse_date, record_from_row, Accomplishment, AccomplishmentFields, FIRST_CONTENT_COLUMN,
    HEADER, USER_COLUMN,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Sheets authentication failed: {0}")]
    Auth(String),

    #[error("Table unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed table request: {0}")]
    Malformed(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Outcome of an id-addressed write. A missing id is a warning, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    Applied,
    NotFound,
}

#[derive(Clone)]
pub struct AccomplishmentStore {
    backend: Arc<dyn TableBackend>,
}

impl AccomplishmentStore {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self { backend }
    }

    /// Ensures the header row exists. A legacy header without `user` is widened
    /// by writing `user` into the next free header cell; existing cells are untouched.
    pub async fn init(&self) -> Result<(), StoreError> {
        let header = self.backend.read_header().await?;

        if header.iter().all(|h| h.trim().is_empty()) {
            self.backend
                .append_row(HEADER.iter().map(|h| h.to_string()).collect())
                .await?;
            info!("Initialized accomplishments table header");
        } else if !header.iter().any(|h| h.trim() == USER_COLUMN) {
            self.backend
                .update_cells(1, header.len() + 1, vec![USER_COLUMN.to_string()])
                .await?;
            info!("Added '{USER_COLUMN}' column to legacy table header");
        }

        Ok(())
    }

    /// Appends a new row with a fresh id. Remote failures propagate to the caller.
    pub async fn add(&self, fields: &AccomplishmentFields, user: &str) -> Result<(), StoreError> {
        if fields.description.trim().is_empty() {
            return Err(StoreError::Validation(
                "Please provide a description.".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let mut row = Vec::with_capacity(HEADER.len());
        row.push(id.clone());
        row.extend(fields.to_cells());
        row.push(user.to_string());

        self.backend.append_row(row).await.map_err(|e| {
            error!("Error adding accomplishment: {e}");
            e
        })?;

        info!("Added accomplishment {id} for user {user}");
        Ok(())
    }

    /// The user's rows, newest first. Rows with unparseable dates sort last.
    ///
    /// An empty or unreachable table yields an empty list; the failure is only logged.
    pub async fn list(&self, user: &str) -> Vec<Accomplishment> {
        let records = match self.read_records().await {
            Ok(records) => records,
            Err(e) => {
                error!("Error fetching accomplishments: {e}");
                return Vec::new();
            }
        };

        let mut dated: Vec<_> = records
            .into_iter()
            .map(|(_, record)| record)
            .filter(|record| record.user == user)
            .map(|mut record| {
                let parsed = parse_date(&record.date);
                if let Some(date) = parsed {
                    record.date = date.format("%Y-%m-%d").to_string();
                }
                (parsed, record)
            })
            .collect();

        dated.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        dated.into_iter().map(|(_, record)| record).collect()
    }

    /// Unfiltered lookup by id across every user's rows.
    ///
    /// Administrative path only; request handlers go through [`Self::get_owned`].
    pub async fn get(&self, id: &str) -> Result<Option<Accomplishment>, StoreError> {
        Ok(self.locate(id).await?.map(|(_, record)| record))
    }

    /// Lookup by id that only returns rows owned by `user`.
    pub async fn get_owned(
        &self,
        id: &str,
        user: &str,
    ) -> Result<Option<Accomplishment>, StoreError> {
        Ok(self.get(id).await?.filter(|record| record.user == user))
    }

    /// Overwrites the content columns of the row with `id` in one range write.
    /// `id` and `user` are never modified. Rows owned by someone else read as not found.
    pub async fn update(
        &self,
        id: &str,
        fields: &AccomplishmentFields,
        user: &str,
    ) -> Result<Mutation, StoreError> {
        let Some((row, record)) = self.locate(id).await? else {
            warn!("Could not find entry to update: {id}");
            return Ok(Mutation::NotFound);
        };
        if record.user != user {
            warn!("User {user} attempted to update entry {id} owned by another user");
            return Ok(Mutation::NotFound);
        }

        self.backend
            .update_cells(row, FIRST_CONTENT_COLUMN, fields.to_cells())
            .await?;
        info!("Updated accomplishment {id}");
        Ok(Mutation::Applied)
    }

    pub async fn delete(&self, id: &str, user: &str) -> Result<Mutation, StoreError> {
        let Some((row, record)) = self.locate(id).await? else {
            warn!("Entry with ID {id} not found.");
            return Ok(Mutation::NotFound);
        };
        if record.user != user {
            warn!("User {user} attempted to delete entry {id} owned by another user");
            return Ok(Mutation::NotFound);
        }

        self.backend.delete_row(row).await?;
        info!("Deleted accomplishment {id}");
        Ok(Mutation::Applied)
    }

    /// Distinct tags across the user's `category` cells, sorted.
    pub async fn unique_tags(&self, user: &str) -> Vec<String> {
        let tags: BTreeSet<String> = self
            .list(user)
            .await
            .iter()
            .flat_map(|record| record.tags().map(str::to_string).collect::<Vec<_>>())
            .collect();
        tags.into_iter().collect()
    }

    /// Reads every data row with its 1-based row number. Blank rows are skipped.
    async fn read_records(&self) -> Result<Vec<(usize, Accomplishment)>, StoreError> {
        let mut rows = self.backend.read_all().await?.into_iter();
        let Some(header) = rows.next() else {
            return Ok(Vec::new());
        };

        Ok(rows
            .enumerate()
            .filter(|(_, row)| row.iter().any(|cell| !cell.trim().is_empty()))
            .map(|(idx, row)| (idx + 2, record_from_row(&header, &row)))
            .collect())
    }

    /// Scans for the row holding `id`.
    async fn locate(&self, id: &str) -> Result<Option<(usize, Accomplishment)>, StoreError> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }
        Ok(self
            .read_records()
            .await?
            .into_iter()
            .find(|(_, record)| record.id == id))
    }
}
