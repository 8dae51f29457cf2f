// Cross-student average/median scores per target date.
//
// Only students with at least one submission on every target date count
// towards the statistics. Everyone else is reported with the dates they
// missed and left out of every table.
use crate::config::SkillAttribution;
use crate::error::{ReportError, Result};
use crate::types::{DateStatRow, MissingDatesRow, Skill, Student};
use crate::util::{average, median, month_day_label};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Students that miss one or more target dates, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EligibilityReport {
    /// Missing dates are listed in target-date order.
    pub ineligible: BTreeMap<String, Vec<String>>,
}

impl EligibilityReport {
    pub fn is_empty(&self) -> bool {
        self.ineligible.is_empty()
    }

    pub fn rows(&self) -> Vec<MissingDatesRow> {
        self.ineligible
            .iter()
            .map(|(student, dates)| MissingDatesRow {
                student: student.clone(),
                missing_dates: dates.join(", "),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillTable {
    pub skill: Skill,
    pub rows: Vec<DateStatRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillChart {
    pub skill: Skill,
    pub title: String,
    pub labels: Vec<String>,
    pub average: Vec<f64>,
    pub median: Vec<f64>,
}

impl SkillChart {
    fn from_table(table: &SkillTable) -> Self {
        Self {
            skill: table.skill,
            title: format!("{} Skill Scores Over Time", table.skill.title()),
            labels: table.rows.iter().map(|r| r.date.clone()).collect(),
            average: table.rows.iter().map(|r| r.average).collect(),
            median: table.rows.iter().map(|r| r.median).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub eligibility: EligibilityReport,
    /// Serve before clear; skills without any row are left out.
    pub tables: Vec<SkillTable>,
    pub charts: Vec<SkillChart>,
}

/// One scored submission on a target date.
struct AggregateRow<'s> {
    student: &'s str,
    date: String,
    skill: Skill,
    score: f64,
}

pub struct AggregateReportBuilder<'a> {
    attribution: SkillAttribution,
    target_dates: &'a [String],
}

impl<'a> AggregateReportBuilder<'a> {
    /// `target_dates` are `mm/dd` labels; their order is the output order.
    pub fn new(attribution: SkillAttribution, target_dates: &'a [String]) -> Self {
        Self {
            attribution,
            target_dates,
        }
    }

    /// Aggregate the already-excluded student set.
    pub fn build(&self, students: &[Student]) -> Result<AggregateReport> {
        let target_set: HashSet<&str> = self.target_dates.iter().map(String::as_str).collect();

        let mut rows: Vec<AggregateRow> = Vec::new();
        let mut student_dates: HashMap<&str, HashSet<String>> = HashMap::new();

        for student in students {
            let dates = student_dates.entry(student.name.as_str()).or_default();
            for record in &student.portfolio {
                let label = month_day_label(&record.date);
                if !target_set.contains(label.as_str()) {
                    continue;
                }
                dates.insert(label.clone());
                rows.push(AggregateRow {
                    student: student.name.as_str(),
                    date: label,
                    skill: self.attribution.skill_for(record.date),
                    score: record.score,
                });
            }
        }

        let eligibility = self.eligibility(&student_dates);
        rows.retain(|r| !eligibility.ineligible.contains_key(r.student));
        if rows.is_empty() {
            return Err(ReportError::EmptyResult { eligibility });
        }

        let tables: Vec<SkillTable> = Skill::ALL
            .into_iter()
            .filter_map(|skill| self.skill_table(skill, &rows))
            .collect();
        let charts = tables.iter().map(SkillChart::from_table).collect();

        Ok(AggregateReport {
            eligibility,
            tables,
            charts,
        })
    }

    fn eligibility(&self, student_dates: &HashMap<&str, HashSet<String>>) -> EligibilityReport {
        let mut ineligible = BTreeMap::new();
        for (name, dates) in student_dates {
            let missing: Vec<String> = self
                .target_dates
                .iter()
                .filter(|d| !dates.contains(d.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                ineligible.insert(name.to_string(), missing);
            }
        }
        EligibilityReport { ineligible }
    }

    fn skill_table(&self, skill: Skill, rows: &[AggregateRow]) -> Option<SkillTable> {
        // Keep only the best score per student per date.
        let mut best: HashMap<(&str, &str), f64> = HashMap::new();
        for r in rows.iter().filter(|r| r.skill == skill) {
            let e = best.entry((r.student, r.date.as_str())).or_insert(r.score);
            if r.score > *e {
                *e = r.score;
            }
        }

        let mut by_date: HashMap<&str, Vec<f64>> = HashMap::new();
        for ((_, date), score) in best {
            by_date.entry(date).or_default().push(score);
        }

        let table_rows: Vec<DateStatRow> = self
            .target_dates
            .iter()
            .filter_map(|d| {
                by_date.remove(d.as_str()).map(|scores| DateStatRow {
                    date: d.clone(),
                    average: average(&scores),
                    median: median(scores),
                })
            })
            .collect();

        if table_rows.is_empty() {
            None
        } else {
            Some(SkillTable {
                skill,
                rows: table_rows,
            })
        }
    }
}
