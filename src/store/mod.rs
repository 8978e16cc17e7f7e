//! Data access for subjects, categories and score records.
//!
//! Every operation takes the connection and the signed-in [`Session`]
//! explicitly. Rows owned by other users are reported as not found.

mod records;
mod subjects;

pub use records::{add_record, delete_record, list_records, update_record, RecordPatch};
pub use subjects::{
    create_subject, delete_subject, list_subjects, load_grade_inputs, CategoryInput, GradeInputs,
};

use crate::entry::EntryError;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub uid: String,
    pub display_name: Option<String>,
}

impl Session {
    pub fn greeting_name(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => "User",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Entry(#[from] EntryError),

    #[error("{0}")]
    BadParams(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("a subject named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("category weights must total 100 (got {total})")]
    WeightsInvalid { total: f64 },

    #[error("{source}")]
    Db {
        code: &'static str,
        table: Option<&'static str>,
        #[source]
        source: rusqlite::Error,
    },
}

impl StoreError {
    pub(crate) fn query(source: rusqlite::Error) -> Self {
        Self::Db {
            code: "db_query_failed",
            table: None,
            source,
        }
    }

    pub(crate) fn write(code: &'static str, table: &'static str, source: rusqlite::Error) -> Self {
        Self::Db {
            code,
            table: Some(table),
            source,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Entry(_) | Self::BadParams(_) => "bad_params",
            Self::NotFound(_) => "not_found",
            Self::DuplicateName { .. } => "duplicate_name",
            Self::WeightsInvalid { .. } => "weights_invalid",
            Self::Db { code, .. } => *code,
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Entry(e) => Some(e.details()),
            Self::DuplicateName { name } => Some(json!({ "name": name })),
            Self::WeightsInvalid { total } => Some(json!({ "total": total })),
            Self::Db {
                table: Some(table), ..
            } => Some(json!({ "table": table })),
            _ => None,
        }
    }
}

pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
