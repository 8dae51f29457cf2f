use crate::util::format_number;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// Timestamp layout used by the submission records, e.g. `2024-11-04-09-30`.
pub const RECORD_DATE_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// Top-level shape of one student document in the store.
#[derive(Debug, Deserialize)]
pub struct RawStudentDocument {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Handedness", default)]
    pub handedness: Option<i64>,
    #[serde(rename = "Portfolio", default)]
    pub portfolio: RawPortfolio,
}

/// Both skill groups map submission id to a raw record. Records are kept as
/// JSON values so one bad record does not reject the whole document.
#[derive(Debug, Default, Deserialize)]
pub struct RawPortfolio {
    #[serde(rename = "Serve", default)]
    pub serve: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "Clear", default)]
    pub clear: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "DateTime")]
    pub date_time: String,
    #[serde(rename = "Rating")]
    pub rating: f64,
    #[serde(rename = "AINote", default)]
    pub ai_note: String,
    #[serde(rename = "PreviewNote", default)]
    pub preview_note: String,
    #[serde(rename = "Reflection", default)]
    pub reflection: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Serve,
    Clear,
}

impl Skill {
    pub const ALL: [Skill; 2] = [Skill::Serve, Skill::Clear];

    pub fn as_str(self) -> &'static str {
        match self {
            Skill::Serve => "serve",
            Skill::Clear => "clear",
        }
    }

    /// Capitalized form used in sheet and chart titles.
    pub fn title(self) -> &'static str {
        match self {
            Skill::Serve => "Serve",
            Skill::Clear => "Clear",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn from_flag(flag: Option<i64>) -> Self {
        if flag == Some(1) {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handedness::Left => f.write_str("left"),
            Handedness::Right => f.write_str("right"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioRecord {
    pub date: NaiveDateTime,
    pub skill: Skill,
    pub score: f64,
    pub ai_note: String,
    pub preview_note: String,
    pub reflection: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Student {
    pub name: String,
    pub line_id: String,
    pub handedness: Handedness,
    pub portfolio: Vec<PortfolioRecord>,
}

/// One row of a student's worksheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorksheetRow {
    pub date: String,
    pub skill: Skill,
    pub score: f64,
    pub ai_note: String,
    pub preview_note: String,
    pub reflection: String,
}

impl WorksheetRow {
    pub const COLUMNS: usize = 6;

    /// Whether the cell in column `col` holds no value.
    pub fn is_blank(&self, col: usize) -> bool {
        match col {
            0 => self.date.is_empty(),
            3 => self.ai_note.is_empty(),
            4 => self.preview_note.is_empty(),
            5 => self.reflection.is_empty(),
            _ => false,
        }
    }
}

/// One row of the per-skill aggregate table.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DateStatRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Average Score")]
    #[tabled(rename = "Average Score", display_with = "display_score")]
    pub average: f64,
    #[serde(rename = "Median Score")]
    #[tabled(rename = "Median Score", display_with = "display_score")]
    pub median: f64,
}

fn display_score(v: &f64) -> String {
    format_number(*v, 2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct MissingDatesRow {
    #[serde(rename = "Student Name")]
    #[tabled(rename = "Student Name")]
    pub student: String,
    #[serde(rename = "Missing Dates")]
    #[tabled(rename = "Missing Dates")]
    pub missing_dates: String,
}
