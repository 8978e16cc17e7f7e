use super::{now_timestamp, Session, StoreError};
use crate::entry;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRow {
    pub record_id: String,
    pub category_id: String,
    pub name: String,
    #[serde(rename = "item")]
    pub item_max: f64,
    pub score: f64,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub item_max: Option<f64>,
    pub score: Option<f64>,
}

impl RecordPatch {
    /// Fields that are absent or `null` are left unchanged.
    pub fn from_json(raw: &Value) -> Result<Self, StoreError> {
        let Some(obj) = raw.as_object() else {
            return Err(StoreError::BadParams("patch must be an object".into()));
        };
        for k in obj.keys() {
            if k != "name" && k != "item" && k != "score" {
                return Err(StoreError::BadParams(format!("unknown record field: {k}")));
            }
        }
        let present = |k: &str| obj.get(k).filter(|v| !v.is_null());
        let mut patch = RecordPatch::default();
        if let Some(v) = present("name") {
            patch.name = Some(entry::parse_text("name", Some(v))?);
        }
        if let Some(v) = present("item") {
            patch.item_max = Some(entry::parse_item_max("item", Some(v))?);
        }
        if let Some(v) = present("score") {
            patch.score = Some(entry::parse_score("score", Some(v))?);
        }
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.item_max.is_none() && self.score.is_none()
    }
}

fn ensure_owned_category(
    conn: &Connection,
    session: &Session,
    category_id: &str,
) -> Result<(), StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1
             FROM categories c
             JOIN subjects s ON s.id = c.subject_id
             WHERE c.id = ? AND s.owner_uid = ?",
            (category_id, &session.uid),
            |r| r.get(0),
        )
        .optional()
        .map_err(StoreError::query)?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::NotFound("category")),
    }
}

fn read_record(conn: &Connection, session: &Session, record_id: &str) -> Result<RecordRow, StoreError> {
    conn.query_row(
        "SELECT r.id, r.category_id, r.name, r.item_max, r.score, r.created_at, r.updated_at
         FROM records r
         JOIN categories c ON c.id = r.category_id
         JOIN subjects s ON s.id = c.subject_id
         WHERE r.id = ? AND s.owner_uid = ?",
        (record_id, &session.uid),
        map_record,
    )
    .optional()
    .map_err(StoreError::query)?
    .ok_or(StoreError::NotFound("record"))
}

fn map_record(r: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        record_id: r.get(0)?,
        category_id: r.get(1)?,
        name: r.get(2)?,
        item_max: r.get(3)?,
        score: r.get(4)?,
        created_at: r.get(5)?,
        updated_at: r.get(6)?,
    })
}

pub fn list_records(
    conn: &Connection,
    session: &Session,
    category_id: &str,
) -> Result<Vec<RecordRow>, StoreError> {
    ensure_owned_category(conn, session, category_id)?;
    let mut stmt = conn
        .prepare(
            "SELECT id, category_id, name, item_max, score, created_at, updated_at
             FROM records
             WHERE category_id = ?
             ORDER BY rowid",
        )
        .map_err(StoreError::query)?;
    let rows = stmt
        .query_map([category_id], map_record)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)?;
    Ok(rows)
}

pub fn add_record(
    conn: &Connection,
    session: &Session,
    category_id: &str,
    name: &str,
    item_max: f64,
    score: f64,
    allow_extra_credit: bool,
) -> Result<RecordRow, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::BadParams("name is required".into()));
    }
    entry::check_item_max("item", item_max)?;
    entry::check_score("score", score)?;
    ensure_owned_category(conn, session, category_id)?;
    entry::check_score_within(score, item_max, allow_extra_credit)?;

    let record_id = Uuid::new_v4().to_string();
    let created_at = now_timestamp();
    conn.execute(
        "INSERT INTO records(id, category_id, name, item_max, score, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&record_id, category_id, name, item_max, score, &created_at),
    )
    .map_err(|e| StoreError::write("db_insert_failed", "records", e))?;

    Ok(RecordRow {
        record_id,
        category_id: category_id.to_string(),
        name: name.to_string(),
        item_max,
        score,
        created_at,
        updated_at: None,
    })
}

pub fn update_record(
    conn: &Connection,
    session: &Session,
    record_id: &str,
    patch: &RecordPatch,
    allow_extra_credit: bool,
) -> Result<RecordRow, StoreError> {
    let mut row = read_record(conn, session, record_id)?;
    if patch.is_empty() {
        return Ok(row);
    }
    if let Some(name) = &patch.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::BadParams("name is required".into()));
        }
        row.name = name.to_string();
    }
    if let Some(item_max) = patch.item_max {
        row.item_max = entry::check_item_max("item", item_max)?;
    }
    if let Some(score) = patch.score {
        row.score = entry::check_score("score", score)?;
    }
    entry::check_score_within(row.score, row.item_max, allow_extra_credit)?;

    let updated_at = now_timestamp();
    conn.execute(
        "UPDATE records SET name = ?, item_max = ?, score = ?, updated_at = ? WHERE id = ?",
        (&row.name, row.item_max, row.score, &updated_at, record_id),
    )
    .map_err(|e| StoreError::write("db_update_failed", "records", e))?;
    row.updated_at = Some(updated_at);
    Ok(row)
}

pub fn delete_record(conn: &Connection, session: &Session, record_id: &str) -> Result<(), StoreError> {
    read_record(conn, session, record_id)?;
    conn.execute("DELETE FROM records WHERE id = ?", [record_id])
        .map_err(|e| StoreError::write("db_delete_failed", "records", e))?;
    Ok(())
}
