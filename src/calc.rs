use serde::Serialize;

/// Tolerance used when checking that category weights add up to 100.
pub const WEIGHT_TOTAL_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub category_id: String,
    pub category_name: String,
    pub weight_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub category_id: String,
    pub item_max: f64,
    pub score: f64,
}

impl ScoreRecord {
    pub fn percent(&self) -> f64 {
        (self.score / self.item_max) * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub category_id: String,
    pub name: String,
    pub weight_percent: f64,
    pub record_count: usize,
    /// Unweighted mean of the record percentages; `None` when the category
    /// has no records and is therefore left out of the grade.
    pub average_percent: Option<f64>,
    pub contribution: f64,
}

/// Mean of `(score / itemMax) * 100` over the records filed under
/// `category_id`, or `None` when there are none.
pub fn category_average(records: &[ScoreRecord], category_id: &str) -> Option<f64> {
    let mut sum = 0.0_f64;
    let mut count: usize = 0;
    for r in records.iter().filter(|r| r.category_id == category_id) {
        sum += r.percent();
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / (count as f64))
    }
}

/// Weighted grade for one subject.
///
/// Categories are visited in the given order. A category with no matching
/// records is skipped entirely: it adds nothing to the total and its weight is
/// not redistributed. Matching records are averaged by percentage (each record
/// counts once regardless of its item size) and the average is scaled by
/// `weight_percent / 100`.
///
/// `item_max == 0` is not guarded here and yields a non-finite result.
pub fn calculate_grade(records: &[ScoreRecord], categories: &[Category]) -> f64 {
    let mut total_grade = 0.0_f64;
    for c in categories {
        let weight = c.weight_percent / 100.0;
        if let Some(avg) = category_average(records, &c.category_id) {
            total_grade += avg * weight;
        }
    }
    total_grade
}

pub fn category_breakdown(records: &[ScoreRecord], categories: &[Category]) -> Vec<CategoryResult> {
    categories
        .iter()
        .map(|c| {
            let record_count = records
                .iter()
                .filter(|r| r.category_id == c.category_id)
                .count();
            let average_percent = category_average(records, &c.category_id);
            let contribution = average_percent
                .map(|avg| avg * (c.weight_percent / 100.0))
                .unwrap_or(0.0);
            CategoryResult {
                category_id: c.category_id.clone(),
                name: c.category_name.clone(),
                weight_percent: c.weight_percent,
                record_count,
                average_percent,
                contribution,
            }
        })
        .collect()
}

pub fn weight_total(categories: &[Category]) -> f64 {
    categories.iter().map(|c| c.weight_percent).sum()
}

pub fn weights_balanced(categories: &[Category]) -> bool {
    (weight_total(categories) - 100.0).abs() <= WEIGHT_TOTAL_EPSILON
}

/// Half-away-from-zero rounding to `places` decimals. Non-finite input is
/// returned unchanged.
pub fn round_to(x: f64, places: u32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let factor = 10_f64.powi(places as i32);
    (x * factor).round() / factor
}

/// Fixed-precision percent string. Rounds with [`round_to`] first so the
/// text always agrees with the numeric grade.
pub fn format_percent(x: f64, places: u32) -> String {
    format!("{:.*}%", places as usize, round_to(x, places))
}
