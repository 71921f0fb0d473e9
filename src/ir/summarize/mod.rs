//! Implementation of the `ir summarize` subcommand.
//!
//! Aggregates the classified record set into one summary table per
//! invocation: records are grouped by the chosen categorical dimension,
//! counted per flag value, and normalized to percentage shares within each
//! group.  The output is the tabular interface consumed by external chart
//! tooling.

use std::path::PathBuf;

use chrono::Datelike;
use clap::Parser;
use thousands::Separable;

use crate::common::open_write_maybe_gz;
use crate::ir::aggregate::{group_and_count, normalize};
use crate::ir::schema::{yes_no, ClassifiedRecord, MAX_SEQUENCE_VERSION};

/// Categorical dimension to group the records by.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum GroupBy {
    /// Release year of the record.
    Year,
    /// Publication status of the record.
    Publication,
    /// Sequence version of the accession (versions 1 to 3).
    Version,
}

/// Classification flag to count within each group.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Flag {
    /// Both reported arms present with matching lengths.
    Congruent,
    /// Reported arms confirmed by the self-alignment inference.
    CorrectlyIdentified,
    /// Inference found an IR pair that was never reported.
    IrExistsUnreported,
    /// Record has a published reference.
    Published,
}

/// Command line arguments for `ir summarize` sub command.
#[derive(Parser, Debug)]
#[command(about = "Aggregate classification flags into percentage statistics", long_about = None)]
pub struct Args {
    /// Path to the availability table TSV (`.gz` supported).
    #[arg(long)]
    pub path_availability: String,
    /// Path to the IR-stats table TSV, basic or extended (`.gz` supported).
    #[arg(long)]
    pub path_ir_stats: String,
    /// Path to the output summary table TSV (`.gz` supported).
    #[arg(long)]
    pub path_output: PathBuf,
    /// Optional genus blocklist file, one genus per line.
    #[arg(long)]
    pub path_blocklist: Option<String>,
    /// Optional length tolerance in (0, 1] for the congruence checks.
    #[arg(long)]
    pub tolerance: Option<f64>,
    /// Dimension to group by.
    #[arg(long, value_enum)]
    pub group_by: GroupBy,
    /// Flag to count within each group.
    #[arg(long, value_enum)]
    pub flag: Flag,
}

fn group_key(group_by: GroupBy, classified: &ClassifiedRecord) -> Option<String> {
    match group_by {
        GroupBy::Year => classified
            .record
            .create_date
            .map(|date| date.year().to_string()),
        GroupBy::Publication => Some(yes_no(classified.flags.is_published).to_string()),
        GroupBy::Version => classified
            .record
            .sequence_version
            .filter(|version| *version <= MAX_SEQUENCE_VERSION)
            .map(|version| version.to_string()),
    }
}

fn flag_value(flag: Flag, classified: &ClassifiedRecord) -> Option<bool> {
    match flag {
        Flag::Congruent => Some(classified.flags.is_congruent),
        Flag::CorrectlyIdentified => classified.flags.correctly_identified,
        Flag::IrExistsUnreported => classified.flags.ir_exists_unreported,
        Flag::Published => Some(classified.flags.is_published),
    }
}

/// Main entry point for the `ir summarize` command.
pub fn run(common_args: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("Starting `ir summarize`");
    tracing::info!("  common_args = {:?}", &common_args);
    tracing::info!("  args = {:?}", &args);

    let (classified, _) = crate::ir::load_and_classify(
        &args.path_availability,
        &args.path_ir_stats,
        args.path_blocklist.as_deref(),
        args.tolerance,
    )?;
    tracing::info!(
        "aggregating {} records by {} for flag {}",
        classified.len().separate_with_commas(),
        args.group_by,
        args.flag
    );

    let counts = group_and_count(
        &classified,
        |classified| group_key(args.group_by, classified),
        |classified| flag_value(args.flag, classified),
    );
    let counted: u64 = counts.values().sum();
    let skipped = classified.len() as u64 - counted;
    if skipped > 0 {
        tracing::debug!(
            "{} records without usable group key or flag were left out",
            skipped
        );
    }
    let buckets = normalize(&counts)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(open_write_maybe_gz(&args.path_output).map_err(|e| {
            anyhow::anyhow!("could not open {:?} for writing: {}", &args.path_output, e)
        })?);
    writer.write_record(["GROUP", "FLAG", "TOTAL", "PERCENTAGE"])?;
    for bucket in &buckets {
        let total = bucket.total.to_string();
        let percentage = format!("{:.3}", bucket.percentage);
        writer.write_record([
            bucket.key.as_str(),
            yes_no(bucket.flag),
            total.as_str(),
            percentage.as_str(),
        ])?;
    }
    writer.flush()?;
    tracing::info!("wrote {} buckets to {:?}", buckets.len(), &args.path_output);

    Ok(())
}
