use super::{now_timestamp, Session, StoreError};
use crate::calc::{self, Category, ScoreRecord};
use crate::entry;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryInput {
    pub name: String,
    pub weight_percent: f64,
}

impl CategoryInput {
    /// Parses `{ "name": ..., "weight": ... }` as typed into the subject form.
    pub fn from_json(idx: usize, raw: &Value) -> Result<Self, StoreError> {
        let name = entry::parse_text(&format!("categories[{idx}].name"), raw.get("name"))?;
        let weight_percent =
            entry::parse_weight(&format!("categories[{idx}].weight"), raw.get("weight"))?;
        Ok(Self {
            name,
            weight_percent,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRow {
    pub category_id: String,
    pub name: String,
    pub weight_percent: f64,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRow {
    pub subject_id: String,
    pub name: String,
    pub created_at: String,
    pub categories: Vec<CategoryRow>,
}

#[derive(Debug, Clone)]
pub struct GradeInputs {
    pub subject_id: String,
    pub subject_name: String,
    pub categories: Vec<Category>,
    pub records: Vec<ScoreRecord>,
}

fn subject_categories(conn: &Connection, subject_id: &str) -> Result<Vec<CategoryRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, name, weight_percent, sort_order
             FROM categories
             WHERE subject_id = ?
             ORDER BY sort_order",
        )
        .map_err(StoreError::query)?;
    let rows = stmt
        .query_map([subject_id], |r| {
            Ok(CategoryRow {
                category_id: r.get(0)?,
                name: r.get(1)?,
                weight_percent: r.get(2)?,
                sort_order: r.get(3)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)?;
    Ok(rows)
}

/// Name of the subject if it belongs to the session user.
fn owned_subject_name(
    conn: &Connection,
    session: &Session,
    subject_id: &str,
) -> Result<String, StoreError> {
    conn.query_row(
        "SELECT name FROM subjects WHERE id = ? AND owner_uid = ?",
        (subject_id, &session.uid),
        |r| r.get(0),
    )
    .optional()
    .map_err(StoreError::query)?
    .ok_or(StoreError::NotFound("subject"))
}

pub fn list_subjects(conn: &Connection, session: &Session) -> Result<Vec<SubjectRow>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, created_at
             FROM subjects
             WHERE owner_uid = ?
             ORDER BY name COLLATE NOCASE, created_at",
        )
        .map_err(StoreError::query)?;
    let heads: Vec<(String, String, String)> = stmt
        .query_map([&session.uid], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)?;

    let mut out = Vec::with_capacity(heads.len());
    for (subject_id, name, created_at) in heads {
        let categories = subject_categories(conn, &subject_id)?;
        out.push(SubjectRow {
            subject_id,
            name,
            created_at,
            categories,
        });
    }
    Ok(out)
}

pub fn create_subject(
    conn: &Connection,
    session: &Session,
    name: &str,
    categories: &[CategoryInput],
) -> Result<SubjectRow, StoreError> {
    let name = name.trim();
    if name.is_empty() || categories.is_empty() {
        return Err(StoreError::BadParams(
            "subject or category details are incomplete".into(),
        ));
    }

    for (idx, c) in categories.iter().enumerate() {
        if c.name.trim().is_empty() {
            return Err(StoreError::BadParams(format!(
                "categories[{idx}].name is required"
            )));
        }
        entry::check_weight(&format!("categories[{idx}].weight"), c.weight_percent)?;
    }

    let total: f64 = categories.iter().map(|c| c.weight_percent).sum();
    if (total - 100.0).abs() > calc::WEIGHT_TOTAL_EPSILON {
        return Err(StoreError::WeightsInvalid { total });
    }

    let mut stmt = conn
        .prepare("SELECT name FROM subjects WHERE owner_uid = ?")
        .map_err(StoreError::query)?;
    let existing: Vec<String> = stmt
        .query_map([&session.uid], |r| r.get(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)?;
    let lowered = name.to_lowercase();
    if existing.iter().any(|n| n.to_lowercase() == lowered) {
        return Err(StoreError::DuplicateName {
            name: name.to_string(),
        });
    }

    let subject_id = Uuid::new_v4().to_string();
    let created_at = now_timestamp();
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| StoreError::write("db_tx_failed", "subjects", e))?;
    tx.execute(
        "INSERT INTO subjects(id, owner_uid, name, created_at) VALUES(?, ?, ?, ?)",
        (&subject_id, &session.uid, name, &created_at),
    )
    .map_err(|e| StoreError::write("db_insert_failed", "subjects", e))?;

    let mut rows = Vec::with_capacity(categories.len());
    for (i, c) in categories.iter().enumerate() {
        let category_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO categories(id, subject_id, name, weight_percent, sort_order)
             VALUES(?, ?, ?, ?, ?)",
            (&category_id, &subject_id, c.name.trim(), c.weight_percent, i as i64),
        )
        .map_err(|e| StoreError::write("db_insert_failed", "categories", e))?;
        rows.push(CategoryRow {
            category_id,
            name: c.name.trim().to_string(),
            weight_percent: c.weight_percent,
            sort_order: i as i64,
        });
    }
    tx.commit()
        .map_err(|e| StoreError::write("db_tx_failed", "subjects", e))?;

    Ok(SubjectRow {
        subject_id,
        name: name.to_string(),
        created_at,
        categories: rows,
    })
}

/// Removes the subject together with its categories and their records.
/// Returns the number of records removed.
pub fn delete_subject(
    conn: &Connection,
    session: &Session,
    subject_id: &str,
) -> Result<usize, StoreError> {
    owned_subject_name(conn, session, subject_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| StoreError::write("db_tx_failed", "subjects", e))?;
    // Dependency order, no ON DELETE CASCADE.
    let removed_records = tx
        .execute(
            "DELETE FROM records
             WHERE category_id IN (SELECT id FROM categories WHERE subject_id = ?)",
            [subject_id],
        )
        .map_err(|e| StoreError::write("db_delete_failed", "records", e))?;
    tx.execute("DELETE FROM categories WHERE subject_id = ?", [subject_id])
        .map_err(|e| StoreError::write("db_delete_failed", "categories", e))?;
    tx.execute("DELETE FROM subjects WHERE id = ?", [subject_id])
        .map_err(|e| StoreError::write("db_delete_failed", "subjects", e))?;
    tx.commit()
        .map_err(|e| StoreError::write("db_tx_failed", "subjects", e))?;
    Ok(removed_records)
}

/// Categories of the subject in their defined order plus every record filed
/// under any of them.
pub fn load_grade_inputs(
    conn: &Connection,
    session: &Session,
    subject_id: &str,
) -> Result<GradeInputs, StoreError> {
    let subject_name = owned_subject_name(conn, session, subject_id)?;
    let categories: Vec<Category> = subject_categories(conn, subject_id)?
        .into_iter()
        .map(|c| Category {
            category_id: c.category_id,
            category_name: c.name,
            weight_percent: c.weight_percent,
        })
        .collect();

    let mut stmt = conn
        .prepare_cached(
            "SELECT r.category_id, r.item_max, r.score
             FROM records r
             JOIN categories c ON c.id = r.category_id
             WHERE c.subject_id = ?
             ORDER BY r.rowid",
        )
        .map_err(StoreError::query)?;
    let records: Vec<ScoreRecord> = stmt
        .query_map([subject_id], |r| {
            Ok(ScoreRecord {
                category_id: r.get(0)?,
                item_max: r.get(1)?,
                score: r.get(2)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)?;

    Ok(GradeInputs {
        subject_id: subject_id.to_string(),
        subject_name,
        categories,
        records,
    })
}
