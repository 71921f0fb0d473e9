//! Implementation of the `ir classify` subcommand.
//!
//! Reads the availability and IR-stats tables, joins them, derives the
//! classification flags per record, and writes the per-record flag table
//! that `ir summarize` style reports (and external chart tooling) build on.

use std::path::PathBuf;

use clap::Parser;
use itertools::Itertools;
use thousands::Separable;

use crate::common::open_write_maybe_gz;
use crate::ir::schema::{opt_yes_no, yes_no};

/// Command line arguments for `ir classify` sub command.
#[derive(Parser, Debug)]
#[command(about = "Derive per-record IR classification flags", long_about = None)]
pub struct Args {
    /// Path to the availability table TSV (`.gz` supported).
    #[arg(long)]
    pub path_availability: String,
    /// Path to the IR-stats table TSV, basic or extended (`.gz` supported).
    #[arg(long)]
    pub path_ir_stats: String,
    /// Path to the output flag table TSV (`.gz` supported).
    #[arg(long)]
    pub path_output: PathBuf,
    /// Optional genus blocklist file, one genus per line.
    #[arg(long)]
    pub path_blocklist: Option<String>,
    /// Optional length tolerance in (0, 1] for the congruence checks.
    #[arg(long)]
    pub tolerance: Option<f64>,
}

/// Main entry point for the `ir classify` command.
pub fn run(common_args: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("Starting `ir classify`");
    tracing::info!("  common_args = {:?}", &common_args);
    tracing::info!("  args = {:?}", &args);

    let (classified, _) = crate::ir::load_and_classify(
        &args.path_availability,
        &args.path_ir_stats,
        args.path_blocklist.as_deref(),
        args.tolerance,
    )?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(open_write_maybe_gz(&args.path_output).map_err(|e| {
            anyhow::anyhow!("could not open {:?} for writing: {}", &args.path_output, e)
        })?);
    writer.write_record([
        "ACCESSION",
        "IS_PUBLISHED",
        "IS_CONGRUENT",
        "CORRECTLY_IDENTIFIED",
        "IR_EXISTS_UNREPORTED",
    ])?;
    let mut count_rows = 0;
    for classified_record in classified
        .iter()
        .sorted_by(|a, b| a.record.accession.cmp(&b.record.accession))
    {
        let flags = &classified_record.flags;
        writer.write_record([
            classified_record.record.accession.as_str(),
            yes_no(flags.is_published),
            yes_no(flags.is_congruent),
            opt_yes_no(flags.correctly_identified),
            opt_yes_no(flags.ir_exists_unreported),
        ])?;
        count_rows += 1;
    }
    writer.flush()?;
    tracing::info!(
        "wrote {} flag rows to {:?}",
        count_rows.separate_with_commas(),
        &args.path_output
    );

    Ok(())
}
