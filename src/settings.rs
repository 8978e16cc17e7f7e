//! Workspace settings stored as JSON sections in the `settings` table and
//! merged over built-in defaults.

use crate::db;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSection {
    Grading,
    Summary,
}

impl SetupSection {
    pub const ALL: [SetupSection; 2] = [SetupSection::Grading, SetupSection::Summary];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "grading" => Some(Self::Grading),
            "summary" => Some(Self::Summary),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Grading => "grading",
            Self::Summary => "summary",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Grading => "setup.grading",
            Self::Summary => "setup.summary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradingSettings {
    pub display_decimals: u32,
    pub allow_extra_credit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummarySettings {
    pub label_max_chars: usize,
    pub uppercase_labels: bool,
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Grading => json!({
            "displayDecimals": 2,
            "allowExtraCredit": true
        }),
        SetupSection::Summary => json!({
            "labelMaxChars": 10,
            "uppercaseLabels": true
        }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Grading => match k.as_str() {
                "displayDecimals" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 6)?));
                }
                "allowExtraCredit" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown grading field: {}", k)),
            },
            SetupSection::Summary => match k.as_str() {
                "labelMaxChars" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 64)?));
                }
                "uppercaseLabels" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown summary field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed saved values fall back to defaults.
            if let Err(msg) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(section = section.name(), %msg, "ignoring saved settings");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

pub fn save_section(conn: &Connection, section: SetupSection, value: &Value) -> anyhow::Result<()> {
    db::settings_set_json(conn, section.key(), value)
}

pub fn grading(conn: &Connection) -> anyhow::Result<GradingSettings> {
    let v = load_section(conn, SetupSection::Grading)?;
    Ok(GradingSettings {
        display_decimals: v
            .get("displayDecimals")
            .and_then(|v| v.as_u64())
            .unwrap_or(2) as u32,
        allow_extra_credit: v
            .get("allowExtraCredit")
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
    })
}

pub fn summary(conn: &Connection) -> anyhow::Result<SummarySettings> {
    let v = load_section(conn, SetupSection::Summary)?;
    Ok(SummarySettings {
        label_max_chars: v
            .get("labelMaxChars")
            .and_then(|v| v.as_u64())
            .unwrap_or(10) as usize,
        uppercase_labels: v
            .get("uppercaseLabels")
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
    })
}
