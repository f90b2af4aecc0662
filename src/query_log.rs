//! Append-only record of every statement a session ran.

use std::ops::Index;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DriverError;
use crate::results::QueryOutput;
use crate::settings::QuerySettings;
use crate::types::{TypedParameter, param_type_string};

/// One executed statement. Entries are only ever amended by the session that wrote them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryLogEntry {
    pub executed_at: DateTime<Utc>,
    /// Query text as the caller supplied it.
    pub query: String,
    /// Query text as sent to the driver.
    pub rewritten: String,
    pub database: String,
    pub settings: QuerySettings,
    pub params: Vec<TypedParameter>,
    /// One tag per parameter: `i`, `d` or `s`.
    pub param_types: String,
    pub error: Option<DriverError>,
    pub affected_rows: u64,
    pub row_count: usize,
    pub result: Option<QueryOutput>,
    pub insert_id: Option<i64>,
    pub insert_ids: Vec<i64>,
}

impl QueryLogEntry {
    pub(crate) fn new(
        query: &str,
        rewritten: &str,
        database: &str,
        settings: &QuerySettings,
        params: &[TypedParameter],
    ) -> Self {
        Self {
            executed_at: Utc::now(),
            query: query.to_string(),
            rewritten: rewritten.to_string(),
            database: database.to_string(),
            settings: settings.clone(),
            params: params.to_vec(),
            param_types: param_type_string(params),
            error: None,
            affected_rows: 0,
            row_count: 0,
            result: None,
            insert_id: None,
            insert_ids: Vec::new(),
        }
    }

    /// Record generated ids for `affected` rows starting at `first_id`.
    pub(crate) fn record_insert_range(&mut self, first_id: i64, affected: u64) {
        let count = i64::try_from(affected).unwrap_or(i64::MAX);
        self.insert_id = Some(first_id);
        self.insert_ids = if count > 1 {
            (first_id..first_id + count).collect()
        } else {
            vec![first_id]
        };
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Ordered log of entries. Indices are stable for the life of the log.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct QueryLog {
    entries: Vec<QueryLogEntry>,
}

impl QueryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&QueryLogEntry> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn last(&self) -> Option<&QueryLogEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryLogEntry> {
        self.entries.iter()
    }

    /// Render the whole log as JSON.
    ///
    /// # Errors
    /// Returns the serialization error, which only happens for non-string map keys.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub(crate) fn push(&mut self, entry: QueryLogEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut QueryLogEntry> {
        self.entries.get_mut(index)
    }

    /// Drop the newest entry, used for internal follow-up queries.
    pub(crate) fn discard_last(&mut self) -> Option<QueryLogEntry> {
        self.entries.pop()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Index<usize> for QueryLog {
    type Output = QueryLogEntry;

    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index]
    }
}
