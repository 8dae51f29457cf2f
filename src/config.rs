// Run configuration, read from a TOML file and overridden from the CLI.

use crate::error::{ReportError, Result};
use crate::types::Skill;
use crate::util::{is_valid_month_day, parse_record_date};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_UNFILLED_MARKER: &str = "尚未填寫";
pub const DEFAULT_CLEAR_CUTOFF: &str = "2024-11-04-00-00";

/// How a record is assigned to a skill when scores are bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AttributionMode {
    /// Records before the cutoff are serve, on or after it are clear.
    CutoffBased,
    /// Every record is serve. Clear statistics are never produced.
    FixedServe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillAttribution {
    pub mode: AttributionMode,
    pub cutoff: NaiveDateTime,
}

impl SkillAttribution {
    pub fn skill_for(&self, at: NaiveDateTime) -> Skill {
        match self.mode {
            AttributionMode::CutoffBased if at >= self.cutoff => Skill::Clear,
            AttributionMode::CutoffBased | AttributionMode::FixedServe => Skill::Serve,
        }
    }
}

/// Names of accounts (admins, instructors) that never get reports.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExclusionPolicy {
    pub exact: Vec<String>,
    pub contains: Vec<String>,
}

impl ExclusionPolicy {
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exact.iter().any(|n| n == name)
            || self
                .contains
                .iter()
                .any(|part| !part.is_empty() && name.contains(part.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct AttributionSection {
    mode: AttributionMode,
    cutoff: String,
}

impl Default for AttributionSection {
    fn default() -> Self {
        Self {
            mode: AttributionMode::CutoffBased,
            cutoff: DEFAULT_CLEAR_CUTOFF.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ConfigFile {
    unfilled_marker: String,
    target_dates: Vec<String>,
    chart_skills: Vec<Skill>,
    exclusion: ExclusionPolicy,
    attribution: AttributionSection,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            unfilled_marker: DEFAULT_UNFILLED_MARKER.to_string(),
            target_dates: Vec::new(),
            chart_skills: Skill::ALL.to_vec(),
            exclusion: ExclusionPolicy::default(),
            attribution: AttributionSection::default(),
        }
    }
}

/// Validated configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub unfilled_marker: String,
    pub target_dates: Vec<String>,
    pub chart_skills: Vec<Skill>,
    pub exclusion: ExclusionPolicy,
    pub attribution: SkillAttribution,
}

impl ReportConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(s).map_err(|e| ReportError::Config(e.to_string()))?;
        Self::from_file(file)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let cutoff = parse_record_date(&file.attribution.cutoff).map_err(|e| {
            ReportError::Config(format!(
                "invalid cutoff {:?}: {}",
                file.attribution.cutoff, e
            ))
        })?;
        let mut config = Self {
            unfilled_marker: file.unfilled_marker,
            target_dates: Vec::new(),
            chart_skills: file.chart_skills,
            exclusion: file.exclusion,
            attribution: SkillAttribution {
                mode: file.attribution.mode,
                cutoff,
            },
        };
        config.set_target_dates(file.target_dates)?;
        Ok(config)
    }

    /// Replace the target dates, keeping the first occurrence of duplicates.
    pub fn set_target_dates(&mut self, dates: Vec<String>) -> Result<()> {
        let mut out: Vec<String> = Vec::with_capacity(dates.len());
        for d in dates {
            let d = d.trim().to_string();
            if !is_valid_month_day(&d) {
                return Err(ReportError::Config(format!(
                    "target date {:?} is not in mm/dd form",
                    d
                )));
            }
            if !out.contains(&d) {
                out.push(d);
            }
        }
        self.target_dates = out;
        Ok(())
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        let file = ConfigFile::default();
        Self {
            unfilled_marker: file.unfilled_marker,
            target_dates: file.target_dates,
            chart_skills: file.chart_skills,
            exclusion: file.exclusion,
            attribution: SkillAttribution {
                mode: file.attribution.mode,
                cutoff: default_cutoff(),
            },
        }
    }
}

fn default_cutoff() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 11, 4)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}
