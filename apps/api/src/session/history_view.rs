//! The History view: the user's rows as last loaded, plus diff-based saving.
//!
//! Saves compare each submitted row with the snapshot taken at load time and
//! only write rows whose fields actually changed. Rows missing from a save are
//! left alone; deletion goes through its own id-based call.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::models::{normalize_date, Accomplishment, AccomplishmentFields};
use crate::store::{AccomplishmentStore, Mutation, StoreError};

#[derive(Debug, Default)]
pub struct HistoryView {
    snapshot: Vec<Accomplishment>,
}

/// One row as submitted from the inline editor.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEdit {
    pub id: String,
    #[serde(flatten)]
    pub fields: AccomplishmentFields,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub updated: Vec<String>,
    /// Rows that vanished from the table (or changed owner) since the load.
    pub not_found: Vec<String>,
    /// Ids that were never part of the loaded snapshot.
    pub ignored: Vec<String>,
    pub unchanged: usize,
}

impl HistoryView {
    pub fn rows(&self) -> &[Accomplishment] {
        &self.snapshot
    }

    pub async fn load(&mut self, store: &AccomplishmentStore, user: &str) -> &[Accomplishment] {
        self.snapshot = store.list(user).await;
        &self.snapshot
    }

    /// Writes changed rows, then reloads the snapshot.
    ///
    /// Every changed row's date is checked first; one bad date rejects the
    /// whole batch before anything is written. A remote failure aborts the save at that row. Rows written before the
    /// failure stay written and the snapshot is left as it was.
    pub async fn save(
        &mut self,
        store: &AccomplishmentStore,
        user: &str,
        edits: &[HistoryEdit],
    ) -> Result<SaveOutcome, StoreError> {
        let mut outcome = SaveOutcome::default();
        let mut changed = Vec::new();

        for edit in edits {
            let Some(original) = self.snapshot.iter().find(|r| r.id == edit.id) else {
                warn!("Ignoring edit for unknown entry {}", edit.id);
                outcome.ignored.push(edit.id.clone());
                continue;
            };
            if original.fields() == edit.fields {
                outcome.unchanged += 1;
                continue;
            }

            let mut fields = edit.fields.clone();
            fields.date = normalize_date(&fields.date).map_err(StoreError::Validation)?;
            changed.push((edit.id.as_str(), fields));
        }

        for (id, fields) in changed {
            match store.update(id, &fields, user).await? {
                Mutation::Applied => outcome.updated.push(id.to_string()),
                Mutation::NotFound => outcome.not_found.push(id.to_string()),
            }
        }

        info!(
            "History save for {user}: {} updated, {} unchanged",
            outcome.updated.len(),
            outcome.unchanged
        );
        self.load(store, user).await;
        Ok(outcome)
    }
}
