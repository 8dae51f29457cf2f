// Drives one report run: load, per-student reports, aggregate, render, upload.
use crate::aggregate::{AggregateReport, AggregateReportBuilder, EligibilityReport};
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::loader::{load_students, LoadReport, NormalizeOptions};
use crate::missing::MissingFieldNotice;
use crate::output::{Artifact, ReportSink, UploadSink};
use crate::source::DocumentSource;
use crate::student_report::{StudentReport, StudentReportBuilder};
use crate::types::Student;
use anyhow::Context;
use tracing::{info, warn};

/// Students loaded from one snapshot of the data source. Built once per run
/// and passed explicitly to everything that needs it.
#[derive(Debug)]
pub struct Session {
    pub students: Vec<Student>,
    pub load_report: LoadReport,
}

impl Session {
    pub fn load(source: &dyn DocumentSource, config: &ReportConfig) -> anyhow::Result<Self> {
        let (students, load_report) = load_students(source, &NormalizeOptions::from(config))
            .context("failed to load student documents")?;
        info!(
            documents = load_report.total_documents,
            students = load_report.loaded_students,
            skipped = load_report.skipped_documents,
            "loaded student snapshot"
        );
        Ok(Self {
            students,
            load_report,
        })
    }

    /// Students that are not excluded from reporting.
    pub fn reportable_students(&self, config: &ReportConfig) -> Vec<Student> {
        self.students
            .iter()
            .filter(|s| !config.exclusion.is_excluded(&s.name))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOutcome {
    Report(AggregateReport),
    /// Nothing left to aggregate; only the eligibility report was emitted.
    Empty(EligibilityReport),
    /// No target dates were configured.
    Skipped,
}

#[derive(Debug)]
pub struct RunSummary {
    pub student_reports: usize,
    pub missing_fields: Vec<MissingFieldNotice>,
    pub aggregate: AggregateOutcome,
    pub artifacts: Vec<Artifact>,
    pub uploaded: usize,
}

pub struct ReportPipeline<'a> {
    config: &'a ReportConfig,
}

impl<'a> ReportPipeline<'a> {
    pub fn new(config: &'a ReportConfig) -> Self {
        Self { config }
    }

    pub fn student_reports(&self, session: &Session) -> Vec<StudentReport> {
        let builder = StudentReportBuilder::new(&self.config.exclusion, &self.config.chart_skills);
        session
            .students
            .iter()
            .filter_map(|s| builder.build(s))
            .collect()
    }

    pub fn aggregate(&self, session: &Session) -> Result<AggregateOutcome, ReportError> {
        if self.config.target_dates.is_empty() {
            info!("no target dates configured; skipping aggregate report");
            return Ok(AggregateOutcome::Skipped);
        }
        let students = session.reportable_students(self.config);
        let builder =
            AggregateReportBuilder::new(self.config.attribution, &self.config.target_dates);
        match builder.build(&students) {
            Ok(report) => Ok(AggregateOutcome::Report(report)),
            Err(ReportError::EmptyResult { eligibility }) => {
                warn!("no records found for the target dates");
                Ok(AggregateOutcome::Empty(eligibility))
            }
            Err(e) => Err(e),
        }
    }

    pub fn run(
        &self,
        session: &Session,
        sink: &mut dyn ReportSink,
        upload: Option<&dyn UploadSink>,
    ) -> anyhow::Result<RunSummary> {
        let reports = self.student_reports(session);
        let mut missing_fields = Vec::new();
        for report in &reports {
            sink.write_student(report)
                .with_context(|| format!("failed to render report for {}", report.header.name))?;
            missing_fields.extend(report.missing_fields.iter().cloned());
        }
        info!(students = reports.len(), "student reports rendered");

        let aggregate = self.aggregate(session).context("aggregate report failed")?;
        match &aggregate {
            AggregateOutcome::Report(report) => {
                info!(
                    tables = report.tables.len(),
                    ineligible = report.eligibility.ineligible.len(),
                    "aggregate report built"
                );
                sink.write_aggregate(report)
                    .context("failed to render aggregate report")?;
            }
            AggregateOutcome::Empty(eligibility) => {
                sink.write_eligibility(eligibility)
                    .context("failed to render eligibility report")?;
            }
            AggregateOutcome::Skipped => {}
        }

        let artifacts = sink.finish().context("failed to finish rendering")?;

        let mut uploaded = 0;
        if let Some(upload) = upload {
            for artifact in &artifacts {
                upload
                    .delete_file(&artifact.name)
                    .with_context(|| format!("failed to delete previous {}", artifact.name))?;
                upload
                    .upload_file(&artifact.name, &artifact.path)
                    .with_context(|| format!("failed to upload {}", artifact.path.display()))?;
                uploaded += 1;
            }
            info!(files = uploaded, "artifacts uploaded");
        }

        Ok(RunSummary {
            student_reports: reports.len(),
            missing_fields,
            aggregate,
            artifacts,
            uploaded,
        })
    }
}
