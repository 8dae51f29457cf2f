use crate::types::{PortfolioRecord, Student};
use crate::util::format_record_date;
use serde::Serialize;
use std::fmt;

/// Free-text fields students are expected to fill for every submission.
/// Declaration order is the reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    Reflection,
    PreviewNote,
}

impl MissingField {
    pub fn label(self) -> &'static str {
        match self {
            MissingField::Reflection => "weekly reflection",
            MissingField::PreviewNote => "pre-class movement check",
        }
    }

    fn is_missing(self, record: &PortfolioRecord) -> bool {
        match self {
            MissingField::Reflection => record.reflection.is_empty(),
            MissingField::PreviewNote => record.preview_note.is_empty(),
        }
    }
}

const CHECKED_FIELDS: [MissingField; 2] = [MissingField::Reflection, MissingField::PreviewNote];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingFieldNotice {
    pub student: String,
    pub date: String,
    pub fields: Vec<MissingField>,
}

impl fmt::Display for MissingFieldNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.fields.iter().map(|m| m.label()).collect();
        write!(f, "{}: [{}] - {}", self.student, self.date, labels.join(" and "))
    }
}

/// One notice per record that left a checked field empty, in portfolio order.
pub fn detect_missing_fields(student: &Student) -> Vec<MissingFieldNotice> {
    student
        .portfolio
        .iter()
        .filter_map(|record| {
            let fields: Vec<MissingField> = CHECKED_FIELDS
                .into_iter()
                .filter(|m| m.is_missing(record))
                .collect();
            if fields.is_empty() {
                None
            } else {
                Some(MissingFieldNotice {
                    student: student.name.clone(),
                    date: format_record_date(&record.date),
                    fields,
                })
            }
        })
        .collect()
}
