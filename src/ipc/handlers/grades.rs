use super::{param_str, require_session};
use crate::calc;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::settings::{self, SummarySettings};
use crate::store::{self, GradeInputs};
use serde_json::json;

fn chart_label(name: &str, cfg: &SummarySettings) -> String {
    let base = if cfg.uppercase_labels {
        name.to_uppercase()
    } else {
        name.to_string()
    };
    base.chars().take(cfg.label_max_chars).collect()
}

fn subject_grade(inputs: &GradeInputs) -> f64 {
    let grade = calc::calculate_grade(&inputs.records, &inputs.categories);
    if !calc::weights_balanced(&inputs.categories) {
        tracing::warn!(
            subject_id = %inputs.subject_id,
            total = calc::weight_total(&inputs.categories),
            "category weights do not total 100"
        );
    }
    grade
}

fn handle_grades_subject(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match require_session(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject_id = match param_str(req, "subjectId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let grading = match settings::grading(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let inputs = match store::load_grade_inputs(conn, session, subject_id) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &e),
    };

    let grade = subject_grade(&inputs);
    let places = grading.display_decimals;
    let per_category: Vec<serde_json::Value> =
        calc::category_breakdown(&inputs.records, &inputs.categories)
            .into_iter()
            .map(|c| {
                json!({
                    "categoryId": c.category_id,
                    "name": c.name,
                    "weightPercent": c.weight_percent,
                    "recordCount": c.record_count,
                    "averagePercent": c.average_percent.map(|v| calc::round_to(v, places)),
                    "contribution": calc::round_to(c.contribution, places),
                })
            })
            .collect();

    ok(
        &req.id,
        json!({
            "subjectId": inputs.subject_id,
            "subjectName": inputs.subject_name,
            "grade": calc::round_to(grade, places),
            "gradeDisplay": calc::format_percent(grade, places),
            "weightsTotal": calc::weight_total(&inputs.categories),
            "weightsBalanced": calc::weights_balanced(&inputs.categories),
            "perCategory": per_category,
        }),
    )
}

fn handle_summary_chart(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match require_session(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let grading = match settings::grading(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let summary = match settings::summary(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let subjects = match store::list_subjects(conn, session) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &e),
    };

    let places = grading.display_decimals;
    let mut labels = Vec::with_capacity(subjects.len());
    let mut values = Vec::with_capacity(subjects.len());
    let mut rows = Vec::with_capacity(subjects.len());
    for s in &subjects {
        let inputs = match store::load_grade_inputs(conn, session, &s.subject_id) {
            Ok(v) => v,
            Err(e) => return store_err(&req.id, &e),
        };
        let grade = subject_grade(&inputs);
        let label = chart_label(&s.name, &summary);
        labels.push(label.clone());
        values.push(calc::round_to(grade, places));
        rows.push(json!({
            "subjectId": s.subject_id,
            "subjectName": s.name,
            "label": label,
            "grade": calc::round_to(grade, places),
            "gradeDisplay": calc::format_percent(grade, places),
        }));
    }

    ok(
        &req.id,
        json!({
            "labels": labels,
            "values": values,
            "subjects": rows,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.subject" => Some(handle_grades_subject(state, req)),
        "summary.chart" => Some(handle_summary_chart(state, req)),
        _ => None,
    }
}
