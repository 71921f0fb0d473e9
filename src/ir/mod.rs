//! Congruence analysis of annotated inverted repeats in plastid genomes.

use thousands::Separable;

pub mod aggregate;
pub mod classify;
pub mod flags;
pub mod input;
pub mod schema;
pub mod summarize;

/// Load both input tables, join them, and classify every record.
///
/// This is the shared front half of the `ir *` commands.  Paths are
/// tilde-expanded; `.gz` suffixes select transparent decompression.
pub fn load_and_classify(
    path_availability: &str,
    path_ir_stats: &str,
    path_blocklist: Option<&str>,
    tolerance: Option<f64>,
) -> Result<(Vec<schema::ClassifiedRecord>, input::LoadStats), anyhow::Error> {
    let blocklist = match path_blocklist {
        Some(path) => input::read_blocklist(shellexpand::tilde(path).into_owned())?,
        None => Default::default(),
    };

    let (records, stats) = input::load_records(
        shellexpand::tilde(path_availability).into_owned(),
        shellexpand::tilde(path_ir_stats).into_owned(),
        &blocklist,
    )?;
    tracing::info!(
        "joined {} records ({} malformed, {} blocklisted, {} unmatched rows dropped)",
        records.len().separate_with_commas(),
        stats.malformed_rows,
        stats.blocklisted_rows,
        stats.unmatched_rows
    );

    let classified = flags::classify_records(records, tolerance)?;
    Ok((classified, stats))
}
