// Per-student worksheet, highlight mask and progress chart.
use crate::config::ExclusionPolicy;
use crate::missing::{detect_missing_fields, MissingFieldNotice};
use crate::types::{Handedness, Skill, Student, WorksheetRow};
use crate::util::{format_record_date, month_day_label};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentHeader {
    pub name: String,
    pub id: String,
    pub handedness: Handedness,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillSeries {
    pub skill: Skill,
    pub title: String,
    pub points: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentReport {
    pub header: StudentHeader,
    pub rows: Vec<WorksheetRow>,
    /// `(row, column)` of every blank cell in `rows`.
    pub highlight_mask: Vec<(usize, usize)>,
    pub chart: Vec<SkillSeries>,
    pub missing_fields: Vec<MissingFieldNotice>,
}

pub struct StudentReportBuilder<'a> {
    exclusion: &'a ExclusionPolicy,
    chart_skills: &'a [Skill],
}

impl<'a> StudentReportBuilder<'a> {
    pub fn new(exclusion: &'a ExclusionPolicy, chart_skills: &'a [Skill]) -> Self {
        Self {
            exclusion,
            chart_skills,
        }
    }

    /// `None` for excluded accounts.
    pub fn build(&self, student: &Student) -> Option<StudentReport> {
        if self.exclusion.is_excluded(&student.name) {
            return None;
        }

        let rows: Vec<WorksheetRow> = student
            .portfolio
            .iter()
            .map(|r| WorksheetRow {
                date: format_record_date(&r.date),
                skill: r.skill,
                score: r.score,
                ai_note: r.ai_note.clone(),
                preview_note: r.preview_note.clone(),
                reflection: r.reflection.clone(),
            })
            .collect();

        let highlight_mask = highlight_blank_cells(&rows);

        let chart = self
            .chart_skills
            .iter()
            .map(|&skill| SkillSeries {
                skill,
                title: format!("{} Skill Progress", skill.title()),
                points: student
                    .portfolio
                    .iter()
                    .filter(|r| r.skill == skill)
                    .map(|r| (month_day_label(&r.date), r.score))
                    .collect(),
            })
            .collect();

        Some(StudentReport {
            header: StudentHeader {
                name: student.name.clone(),
                id: student.line_id.clone(),
                handedness: student.handedness,
            },
            rows,
            highlight_mask,
            chart,
            missing_fields: detect_missing_fields(student),
        })
    }
}

pub fn highlight_blank_cells(rows: &[WorksheetRow]) -> Vec<(usize, usize)> {
    let mut mask = Vec::new();
    for (row_idx, row) in rows.iter().enumerate() {
        for col in 0..WorksheetRow::COLUMNS {
            if row.is_blank(col) {
                mask.push((row_idx, col));
            }
        }
    }
    mask
}
