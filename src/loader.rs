use crate::config::{ReportConfig, SkillAttribution};
use crate::error::{ReportError, Result};
use crate::source::DocumentSource;
use crate::types::{Handedness, PortfolioRecord, RawRecord, RawStudentDocument, Student};
use crate::util::parse_record_date;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Settings the normalizer needs from the run configuration.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub unfilled_marker: String,
    pub attribution: SkillAttribution,
}

impl From<&ReportConfig> for NormalizeOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            unfilled_marker: config.unfilled_marker.clone(),
            attribution: config.attribution,
        }
    }
}

/// A student plus the records that had to be dropped while building it.
#[derive(Debug)]
pub struct Normalized {
    pub student: Student,
    pub dropped: Vec<ReportError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_documents: usize,
    pub loaded_students: usize,
    pub skipped_documents: usize,
    pub dropped_records: usize,
}

/// Union of the two skill groups keyed by submission id.
///
/// Serve entries come first in their own order, followed by Clear-only
/// entries. When both groups hold the same id the Clear value replaces the
/// Serve one but keeps the Serve position.
pub fn merge_skill_groups<'a>(
    serve: &'a Map<String, Value>,
    clear: &'a Map<String, Value>,
) -> Vec<(&'a str, &'a Value)> {
    let mut merged: Vec<(&str, &Value)> = Vec::with_capacity(serve.len() + clear.len());
    let mut position: HashMap<&str, usize> = HashMap::new();
    for (id, value) in serve.iter().chain(clear.iter()) {
        match position.get(id.as_str()) {
            Some(&idx) => merged[idx].1 = value,
            None => {
                position.insert(id.as_str(), merged.len());
                merged.push((id.as_str(), value));
            }
        }
    }
    merged
}

/// Blank out free text that still carries the "not yet filled" marker.
pub fn clear_unfilled(text: String, marker: &str) -> String {
    if !marker.is_empty() && text.contains(marker) {
        String::new()
    } else {
        text
    }
}

fn normalize_record(
    id: &str,
    value: &Value,
    options: &NormalizeOptions,
) -> Result<PortfolioRecord> {
    let raw: RawRecord =
        serde_json::from_value(value.clone()).map_err(|e| ReportError::MalformedRecord {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
    let date = parse_record_date(&raw.date_time).map_err(|source| ReportError::DateParse {
        value: raw.date_time.clone(),
        source,
    })?;
    Ok(PortfolioRecord {
        date,
        skill: options.attribution.skill_for(date),
        score: raw.rating,
        ai_note: raw.ai_note,
        preview_note: clear_unfilled(raw.preview_note, &options.unfilled_marker),
        reflection: clear_unfilled(raw.reflection, &options.unfilled_marker),
    })
}

fn is_empty_document(doc: &Value) -> bool {
    match doc {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Turn one raw document into a date-sorted student portfolio.
pub fn normalize_student(doc: &Value, options: &NormalizeOptions) -> Result<Normalized> {
    if is_empty_document(doc) {
        return Err(ReportError::EmptyDocument);
    }
    let raw: RawStudentDocument =
        serde_json::from_value(doc.clone()).map_err(|e| ReportError::MalformedDocument {
            reason: e.to_string(),
        })?;

    let mut portfolio = Vec::new();
    let mut dropped = Vec::new();
    for (id, value) in merge_skill_groups(&raw.portfolio.serve, &raw.portfolio.clear) {
        match normalize_record(id, value, options) {
            Ok(record) => portfolio.push(record),
            Err(e) => dropped.push(e),
        }
    }
    // `sort_by_key` is stable, so same-minute records keep merge order.
    portfolio.sort_by_key(|r| r.date);

    Ok(Normalized {
        student: Student {
            name: raw.name,
            line_id: raw.id,
            handedness: Handedness::from_flag(raw.handedness),
            portfolio,
        },
        dropped,
    })
}

/// Fetch every document from `source` and normalize them one by one.
///
/// A document that cannot be normalized is logged and skipped; it never
/// stops the others from loading.
pub fn load_students(
    source: &dyn DocumentSource,
    options: &NormalizeOptions,
) -> anyhow::Result<(Vec<Student>, LoadReport)> {
    let documents = source.fetch_documents()?;
    let mut report = LoadReport {
        total_documents: documents.len(),
        ..LoadReport::default()
    };
    let mut students = Vec::with_capacity(documents.len());

    for (idx, doc) in documents.iter().enumerate() {
        match normalize_student(doc, options) {
            Ok(Normalized { student, dropped }) => {
                for err in &dropped {
                    warn!(student = %student.name, error = %err, "dropped portfolio record");
                }
                report.dropped_records += dropped.len();
                debug!(
                    student = %student.name,
                    records = student.portfolio.len(),
                    "normalized student"
                );
                students.push(student);
            }
            Err(err) => {
                warn!(document = idx, error = %err, "skipping student document");
                report.skipped_documents += 1;
            }
        }
    }

    report.loaded_students = students.len();
    Ok((students, report))
}
