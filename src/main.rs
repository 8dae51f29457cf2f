// Entry point and high-level CLI flow.
//
// `generate` loads a snapshot of student documents, writes one worksheet per
// student plus the cross-student average/median report, and optionally
// uploads the results. `check` only lists submissions with unfilled fields.
mod aggregate;
mod config;
mod error;
mod loader;
mod missing;
mod output;
mod pipeline;
mod source;
mod student_report;
mod types;
mod util;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::{AttributionMode, ReportConfig};
use missing::MissingFieldNotice;
use output::{CsvReportSink, DirectoryUploadSink, UploadSink};
use pipeline::{AggregateOutcome, ReportPipeline, RunSummary, Session};
use source::JsonFileSource;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portfolio-report")]
#[command(about = "Student skill-practice portfolio reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build per-student worksheets and the average/median report
    Generate {
        /// Student collection export (JSON)
        #[arg(long)]
        input: PathBuf,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "reports")]
        out: PathBuf,
        /// Copy finished artifacts into this directory
        #[arg(long)]
        upload_dir: Option<PathBuf>,
        /// Target date in mm/dd form; repeat to keep order. Overrides the config.
        #[arg(long = "target-date")]
        target_dates: Vec<String>,
        #[arg(long, value_enum)]
        mode: Option<AttributionMode>,
    },
    /// List submissions whose reflection or preview note is unfilled
    Check {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ReportConfig> {
    match path {
        Some(p) => ReportConfig::load(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(ReportConfig::default()),
    }
}

/// One line per notice followed by a total, shared by `generate` and `check`.
fn missing_fields_text(notices: &[MissingFieldNotice], students: usize) -> String {
    let mut text = String::new();
    for notice in notices {
        text.push_str(&notice.to_string());
        text.push('\n');
    }
    text.push_str(&format!(
        "\n{} submissions with unfilled fields across {} students.",
        util::format_int(notices.len()),
        util::format_int(students)
    ));
    text
}

fn print_summary(session: &Session, summary: &RunSummary) {
    let load = &session.load_report;
    println!(
        "Processing snapshot... ({} documents, {} students loaded)",
        util::format_int(load.total_documents),
        util::format_int(load.loaded_students)
    );
    if load.skipped_documents > 0 || load.dropped_records > 0 {
        println!(
            "Note: {} documents and {} records skipped due to validation errors.",
            util::format_int(load.skipped_documents),
            util::format_int(load.dropped_records)
        );
    }
    println!(
        "Student worksheets: {}\n",
        util::format_int(summary.student_reports)
    );
    println!(
        "{}\n",
        missing_fields_text(&summary.missing_fields, summary.student_reports)
    );

    match &summary.aggregate {
        AggregateOutcome::Report(report) => {
            for table in &report.tables {
                println!("{} Skill", table.skill.title());
                output::preview_table_rows(&table.rows, table.rows.len());
            }
            if !report.eligibility.is_empty() {
                println!("Students Missing Records");
                output::preview_table_rows(
                    &report.eligibility.rows(),
                    report.eligibility.ineligible.len(),
                );
            }
        }
        AggregateOutcome::Empty(eligibility) => {
            println!("No records found for the specified dates.\n");
            println!("Students Missing Records");
            output::preview_table_rows(&eligibility.rows(), eligibility.ineligible.len());
        }
        AggregateOutcome::Skipped => {}
    }

    println!(
        "{} files written{}",
        util::format_int(summary.artifacts.len()),
        if summary.uploaded > 0 {
            format!(", {} uploaded", util::format_int(summary.uploaded))
        } else {
            String::new()
        }
    );
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            config,
            out,
            upload_dir,
            target_dates,
            mode,
        } => {
            let mut config = load_config(config.as_deref())?;
            if !target_dates.is_empty() {
                config.set_target_dates(target_dates)?;
            }
            if let Some(mode) = mode {
                config.attribution.mode = mode;
            }

            let session = Session::load(&JsonFileSource::new(&input), &config)?;
            let mut sink = CsvReportSink::new(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let upload = upload_dir
                .as_deref()
                .map(|dir| DirectoryUploadSink::new(dir))
                .transpose()?;

            let summary = ReportPipeline::new(&config).run(
                &session,
                &mut sink,
                upload.as_ref().map(|u| u as &dyn UploadSink),
            )?;
            print_summary(&session, &summary);
        }
        Commands::Check { input, config } => {
            let config = load_config(config.as_deref())?;
            let session = Session::load(&JsonFileSource::new(&input), &config)?;
            let reports = ReportPipeline::new(&config).student_reports(&session);
            let notices: Vec<MissingFieldNotice> = reports
                .iter()
                .flat_map(|r| r.missing_fields.iter().cloned())
                .collect();
            println!("{}", missing_fields_text(&notices, reports.len()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use missing::MissingField;
    use pretty_assertions::assert_eq;

    #[test]
    fn summary_lists_every_unfilled_submission() {
        let notices = vec![
            MissingFieldNotice {
                student: "A".to_string(),
                date: "2024-11-04-09-00".to_string(),
                fields: vec![MissingField::PreviewNote],
            },
            MissingFieldNotice {
                student: "B".to_string(),
                date: "2024-11-11-09-00".to_string(),
                fields: vec![MissingField::Reflection, MissingField::PreviewNote],
            },
        ];
        assert_eq!(
            missing_fields_text(&notices, 2),
            "A: [2024-11-04-09-00] - pre-class movement check\n\
             B: [2024-11-11-09-00] - weekly reflection and pre-class movement check\n\
             \n2 submissions with unfilled fields across 2 students."
        );
    }

    #[test]
    fn summary_without_notices_still_reports_total() {
        assert_eq!(
            missing_fields_text(&[], 3),
            "\n0 submissions with unfilled fields across 3 students."
        );
    }
}
