use crate::aggregate::{AggregateReport, EligibilityReport};
use crate::error::Result;
use crate::student_report::StudentReport;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::{debug, info};

const STUDENTS_DIR: &str = "students";

/// A rendered file. `name` is its `/`-separated path relative to the
/// output root and is also the name it is uploaded under.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
}

/// Consumes finished reports and renders them somewhere.
pub trait ReportSink {
    fn write_student(&mut self, report: &StudentReport) -> Result<()>;
    fn write_eligibility(&mut self, eligibility: &EligibilityReport) -> Result<()>;
    fn write_aggregate(&mut self, report: &AggregateReport) -> Result<()>;
    /// Flush everything and return the artifacts that were produced.
    fn finish(&mut self) -> Result<Vec<Artifact>>;
}

/// Receives finished artifacts, replacing any earlier copy with the same name.
pub trait UploadSink {
    fn delete_file(&self, name: &str) -> Result<()>;
    fn upload_file(&self, name: &str, path: &Path) -> Result<()>;
}

/// Writes one CSV worksheet per student under `students/`, the aggregate
/// tables and the chart descriptors as JSON, all under one output directory.
pub struct CsvReportSink {
    out_dir: PathBuf,
    written: Vec<Artifact>,
    charts: Vec<serde_json::Value>,
    /// Lowercased worksheet stems already taken in this run.
    worksheet_stems: HashSet<String>,
}

impl CsvReportSink {
    pub fn new(out_dir: impl AsRef<Path>) -> Result<Self> {
        let out_dir = out_dir.as_ref().to_path_buf();
        fs::create_dir_all(out_dir.join(STUDENTS_DIR))?;
        Ok(Self {
            out_dir,
            written: Vec::new(),
            charts: Vec::new(),
            worksheet_stems: HashSet::new(),
        })
    }

    /// Names are not unique, so a later student with the same stem gets a
    /// numbered suffix, the way a workbook renames duplicate sheets.
    fn worksheet_stem(&mut self, student: &str) -> String {
        let base = file_stem(student);
        let mut stem = base.clone();
        let mut n = 2;
        while !self.worksheet_stems.insert(stem.to_lowercase()) {
            stem = format!("{} ({})", base, n);
            n += 1;
        }
        stem
    }

    fn artifact(&mut self, name: String) -> PathBuf {
        let path = self.out_dir.join(&name);
        self.written.push(Artifact {
            name,
            path: path.clone(),
        });
        path
    }
}

impl ReportSink for CsvReportSink {
    fn write_student(&mut self, report: &StudentReport) -> Result<()> {
        let stem = self.worksheet_stem(&report.header.name);
        let path = self.artifact(format!("{}/{}.csv", STUDENTS_DIR, stem));

        // Header block, a blank row, then the record table.
        let handedness = report.header.handedness.to_string();
        let mut wtr = csv::WriterBuilder::new().flexible(true).from_path(&path)?;
        wtr.write_record(["Name", report.header.name.as_str()])?;
        wtr.write_record(["Line ID", report.header.id.as_str()])?;
        wtr.write_record(["Handedness", handedness.as_str()])?;
        // csv quotes a lone empty field, so the spacer goes straight to the file.
        wtr.flush()?;
        (&mut wtr.get_ref()).write_all(b"\n")?;
        wtr.write_record([
            "Date",
            "Skill",
            "Score",
            "AI Note",
            "Preview Note",
            "Reflection",
        ])?;
        for row in &report.rows {
            wtr.write_record([
                row.date.clone(),
                row.skill.to_string(),
                row.score.to_string(),
                row.ai_note.clone(),
                row.preview_note.clone(),
                row.reflection.clone(),
            ])?;
        }
        wtr.flush()?;
        debug!(path = %path.display(), "wrote student worksheet");

        self.charts.push(serde_json::json!({
            "student": report.header.name,
            "worksheet": format!("{}/{}.csv", STUDENTS_DIR, stem),
            "highlight_mask": report.highlight_mask,
            "chart": report.chart,
        }));
        Ok(())
    }

    fn write_eligibility(&mut self, eligibility: &EligibilityReport) -> Result<()> {
        let path = self.artifact("students_missing_records.csv".to_string());
        let mut wtr = csv::Writer::from_path(&path)?;
        // The header is written even when every student is eligible.
        wtr.write_record(["Student Name", "Missing Dates"])?;
        for row in eligibility.rows() {
            wtr.write_record([row.student, row.missing_dates])?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_aggregate(&mut self, report: &AggregateReport) -> Result<()> {
        self.write_eligibility(&report.eligibility)?;
        for table in &report.tables {
            let path = self.artifact(format!("average_and_median_{}.csv", table.skill));
            write_csv(&path, &table.rows)?;
        }
        let path = self.artifact("aggregate_charts.json".to_string());
        write_json(&path, &report.charts)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<Artifact>> {
        let path = self.artifact("student_charts.json".to_string());
        write_json(&path, &self.charts)?;
        info!(files = self.written.len(), dir = %self.out_dir.display(), "reports rendered");
        Ok(std::mem::take(&mut self.written))
    }
}

/// Copies artifacts into a destination directory standing in for remote storage.
/// Relative names keep their sub-directories.
pub struct DirectoryUploadSink {
    dest: PathBuf,
}

impl DirectoryUploadSink {
    pub fn new(dest: impl AsRef<Path>) -> Result<Self> {
        let dest = dest.as_ref().to_path_buf();
        fs::create_dir_all(&dest)?;
        Ok(Self { dest })
    }
}

impl UploadSink for DirectoryUploadSink {
    fn delete_file(&self, name: &str) -> Result<()> {
        let target = self.dest.join(name);
        if target.exists() {
            fs::remove_file(&target)?;
            debug!(path = %target.display(), "deleted previous upload");
        }
        Ok(())
    }

    fn upload_file(&self, name: &str, path: &Path) -> Result<()> {
        let target = self.dest.join(name);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(path, &target)?;
        Ok(())
    }
}

/// Names are free text; keep them usable as file names.
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim().trim_matches('.');
    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem.to_string()
    }
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s)?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{SkillChart, SkillTable};
    use crate::student_report::{SkillSeries, StudentHeader};
    use crate::types::{DateStatRow, Handedness, Skill, WorksheetRow};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn student_report(name: &str) -> StudentReport {
        StudentReport {
            header: StudentHeader {
                name: name.to_string(),
                id: "U1".to_string(),
                handedness: Handedness::Left,
            },
            rows: vec![WorksheetRow {
                date: "2024-10-21-10-00".to_string(),
                skill: Skill::Serve,
                score: 60.0,
                ai_note: "higher toss".to_string(),
                preview_note: String::new(),
                reflection: "ok".to_string(),
            }],
            highlight_mask: vec![(0, 4)],
            chart: vec![SkillSeries {
                skill: Skill::Serve,
                title: "Serve Skill Progress".to_string(),
                points: vec![("10/21".to_string(), 60.0)],
            }],
            missing_fields: Vec::new(),
        }
    }

    #[test]
    fn student_worksheet_has_header_block() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvReportSink::new(dir.path()).unwrap();
        sink.write_student(&student_report("Avery")).unwrap();
        let written = sink.finish().unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].name, "students/Avery.csv");

        let text = fs::read_to_string(dir.path().join("students/Avery.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Name,Avery");
        assert_eq!(lines[2], "Handedness,left");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "Date,Skill,Score,AI Note,Preview Note,Reflection");
        assert_eq!(lines[5], "2024-10-21-10-00,serve,60,higher toss,,ok");
    }

    #[test]
    fn aggregate_tables_and_missing_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvReportSink::new(dir.path()).unwrap();
        let report = AggregateReport {
            eligibility: EligibilityReport {
                ineligible: BTreeMap::from([(
                    "B".to_string(),
                    vec!["11/04".to_string(), "11/11".to_string()],
                )]),
            },
            tables: vec![SkillTable {
                skill: Skill::Serve,
                rows: vec![DateStatRow {
                    date: "10/28".to_string(),
                    average: 65.5,
                    median: 65.5,
                }],
            }],
            charts: vec![SkillChart {
                skill: Skill::Serve,
                title: "Serve Skill Scores Over Time".to_string(),
                labels: vec!["10/28".to_string()],
                average: vec![65.5],
                median: vec![65.5],
            }],
        };
        sink.write_aggregate(&report).unwrap();

        let table = fs::read_to_string(dir.path().join("average_and_median_serve.csv")).unwrap();
        assert_eq!(table, "Date,Average Score,Median Score\n10/28,65.5,65.5\n");
        let missing = fs::read_to_string(dir.path().join("students_missing_records.csv")).unwrap();
        assert_eq!(missing, "Student Name,Missing Dates\nB,\"11/04, 11/11\"\n");
        assert!(dir.path().join("aggregate_charts.json").exists());
    }

    #[test]
    fn colliding_student_names_get_separate_worksheets() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvReportSink::new(dir.path()).unwrap();
        let mut first = student_report("Lin A/B");
        first.header.id = "U1".to_string();
        let mut second = student_report("Lin A_B");
        second.header.id = "U2".to_string();
        let mut third = student_report("Lin A/B");
        third.header.id = "U3".to_string();
        for report in [&first, &second, &third, &student_report("students_missing_records")] {
            sink.write_student(report).unwrap();
        }
        sink.write_eligibility(&EligibilityReport::default()).unwrap();
        let written = sink.finish().unwrap();

        let names: Vec<&str> = written.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "students/Lin A_B.csv",
                "students/Lin A_B (2).csv",
                "students/Lin A_B (3).csv",
                "students/students_missing_records.csv",
                "students_missing_records.csv",
                "student_charts.json",
            ]
        );
        let second_sheet =
            fs::read_to_string(dir.path().join("students/Lin A_B (2).csv")).unwrap();
        assert!(second_sheet.contains("Line ID,U2"));
        let third_sheet =
            fs::read_to_string(dir.path().join("students/Lin A_B (3).csv")).unwrap();
        assert!(third_sheet.contains("Line ID,U3"));
    }

    #[test]
    fn eligibility_sheet_keeps_header_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvReportSink::new(dir.path()).unwrap();
        sink.write_eligibility(&EligibilityReport::default()).unwrap();
        let text = fs::read_to_string(dir.path().join("students_missing_records.csv")).unwrap();
        assert_eq!(text, "Student Name,Missing Dates\n");
    }

    #[test]
    fn upload_keeps_relative_paths() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let sheet = src.path().join("sheet.csv");
        fs::write(&sheet, "student").unwrap();
        let summary = src.path().join("summary.csv");
        fs::write(&summary, "aggregate").unwrap();

        let sink = DirectoryUploadSink::new(dest.path()).unwrap();
        sink.upload_file("students/report.csv", &sheet).unwrap();
        sink.upload_file("report.csv", &summary).unwrap();
        assert_eq!(
            fs::read_to_string(dest.path().join("students/report.csv")).unwrap(),
            "student"
        );
        assert_eq!(
            fs::read_to_string(dest.path().join("report.csv")).unwrap(),
            "aggregate"
        );
    }

    #[test]
    fn upload_replaces_previous_copy() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let file = src.path().join("report.csv");
        fs::write(&file, "new").unwrap();
        fs::write(dest.path().join("report.csv"), "old").unwrap();

        let sink = DirectoryUploadSink::new(dest.path()).unwrap();
        sink.delete_file("report.csv").unwrap();
        assert!(!dest.path().join("report.csv").exists());
        sink.upload_file("report.csv", &file).unwrap();
        assert_eq!(fs::read_to_string(dest.path().join("report.csv")).unwrap(), "new");
        // Deleting something that is not there is fine.
        sink.delete_file("absent.csv").unwrap();
    }

    #[test]
    fn file_stems_are_sanitized() {
        assert_eq!(file_stem("Avery Lee"), "Avery Lee");
        assert_eq!(file_stem("a/b:c"), "a_b_c");
        assert_eq!(file_stem(".."), "unnamed");
    }
}
