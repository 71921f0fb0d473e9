//! Reading and joining of the availability and IR-stats tables.
//!
//! Both tables are tab-separated with a header row.  Numeric fields arrive
//! as text and may carry the `n.a.` sentinel or GenBank fuzzy-location
//! prefixes (`<`, `>`); such values parse to `None` instead of failing the
//! row.  Malformed rows are skipped and counted, never fatal.

use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::common::open_read_maybe_gz;
use crate::ir::schema::{GenomeRecord, IrAnnotation};

/// Parse an integer field, treating unparseable values as unset.
///
/// A single leading `<` or `>` (GenBank fuzzy location) is stripped before
/// parsing.
pub fn parse_lenient_int(value: &str) -> Option<i64> {
    let value = value.trim();
    let value = value
        .strip_prefix(|c| matches!(c, '<' | '>'))
        .unwrap_or(value);
    value.parse().ok()
}

/// Parse a sequence version field; versions are positive integers.
pub fn parse_lenient_version(value: &str) -> Option<u32> {
    parse_lenient_int(value)
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
}

/// Parse a date field, canonical ISO format first, `day/month/year` as
/// fallback.  Anything else is unset.
pub fn parse_lenient_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .ok()
}

fn from_yes_no<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().eq_ignore_ascii_case("yes"))
}

fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(parse_lenient_int(&value))
}

fn lenient_version<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(parse_lenient_version(&value))
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(parse_lenient_date(&value))
}

/// Availability table row as read from TSV.
///
/// Additional columns (`UID`, `ORGANISM`, `AUTHORS`, ...) are tolerated and
/// ignored.
#[derive(Debug, Deserialize)]
pub struct AvailabilityRecord {
    /// GenBank accession.
    #[serde(rename = "ACCESSION")]
    pub accession: String,
    /// Record creation date.
    #[serde(rename = "CREATE_DATE", default, deserialize_with = "lenient_date")]
    pub create_date: Option<NaiveDate>,
    /// Literature reference, `Unpublished` for unpublished records.
    #[serde(rename = "REFERENCE", default)]
    pub reference: String,
    /// Sequence version of the accession.
    #[serde(rename = "VERSION", default, deserialize_with = "lenient_version")]
    pub version: Option<u32>,
    /// Semicolon-separated taxonomy lineage, if the table carries one.
    #[serde(rename = "TAXONOMY", default)]
    pub taxonomy: Option<String>,
}

/// IR-stats table row as read from TSV.
///
/// The `*_BLASTINFERRED*` columns only exist after the self-alignment
/// confirmation step has run; a basic table yields absent inference.
#[derive(Debug, Deserialize)]
pub struct IrStatsRecord {
    /// GenBank accession.
    #[serde(rename = "ACCESSION")]
    pub accession: String,

    /// Whether IR arm A was reported with the record.
    #[serde(rename = "IRa_REPORTED", default, deserialize_with = "from_yes_no")]
    pub ira_reported: bool,
    /// Reported start of arm A.
    #[serde(rename = "IRa_REPORTED_START", default, deserialize_with = "lenient_int")]
    pub ira_reported_start: Option<i64>,
    /// Reported end of arm A.
    #[serde(rename = "IRa_REPORTED_END", default, deserialize_with = "lenient_int")]
    pub ira_reported_end: Option<i64>,
    /// Reported length of arm A.
    #[serde(rename = "IRa_REPORTED_LENGTH", default, deserialize_with = "lenient_int")]
    pub ira_reported_length: Option<i64>,

    /// Whether IR arm B was reported with the record.
    #[serde(rename = "IRb_REPORTED", default, deserialize_with = "from_yes_no")]
    pub irb_reported: bool,
    /// Reported start of arm B.
    #[serde(rename = "IRb_REPORTED_START", default, deserialize_with = "lenient_int")]
    pub irb_reported_start: Option<i64>,
    /// Reported end of arm B.
    #[serde(rename = "IRb_REPORTED_END", default, deserialize_with = "lenient_int")]
    pub irb_reported_end: Option<i64>,
    /// Reported length of arm B.
    #[serde(rename = "IRb_REPORTED_LENGTH", default, deserialize_with = "lenient_int")]
    pub irb_reported_length: Option<i64>,

    /// Whether the self-alignment found arm A.
    #[serde(rename = "IRa_BLASTINFERRED", default, deserialize_with = "from_yes_no")]
    pub ira_inferred: bool,
    /// Inferred start of arm A.
    #[serde(
        rename = "IRa_BLASTINFERRED_START",
        default,
        deserialize_with = "lenient_int"
    )]
    pub ira_inferred_start: Option<i64>,
    /// Inferred end of arm A.
    #[serde(
        rename = "IRa_BLASTINFERRED_END",
        default,
        deserialize_with = "lenient_int"
    )]
    pub ira_inferred_end: Option<i64>,
    /// Inferred length of arm A.
    #[serde(
        rename = "IRa_BLASTINFERRED_LENGTH",
        default,
        deserialize_with = "lenient_int"
    )]
    pub ira_inferred_length: Option<i64>,

    /// Whether the self-alignment found arm B.
    #[serde(rename = "IRb_BLASTINFERRED", default, deserialize_with = "from_yes_no")]
    pub irb_inferred: bool,
    /// Inferred start of arm B.
    #[serde(
        rename = "IRb_BLASTINFERRED_START",
        default,
        deserialize_with = "lenient_int"
    )]
    pub irb_inferred_start: Option<i64>,
    /// Inferred end of arm B.
    #[serde(
        rename = "IRb_BLASTINFERRED_END",
        default,
        deserialize_with = "lenient_int"
    )]
    pub irb_inferred_end: Option<i64>,
    /// Inferred length of arm B.
    #[serde(
        rename = "IRb_BLASTINFERRED_LENGTH",
        default,
        deserialize_with = "lenient_int"
    )]
    pub irb_inferred_length: Option<i64>,
}

impl IrStatsRecord {
    fn reported_a(&self) -> IrAnnotation {
        IrAnnotation {
            present: self.ira_reported,
            start: self.ira_reported_start,
            end: self.ira_reported_end,
            length: self.ira_reported_length,
        }
    }

    fn reported_b(&self) -> IrAnnotation {
        IrAnnotation {
            present: self.irb_reported,
            start: self.irb_reported_start,
            end: self.irb_reported_end,
            length: self.irb_reported_length,
        }
    }

    fn blast_a(&self) -> IrAnnotation {
        IrAnnotation {
            present: self.ira_inferred,
            start: self.ira_inferred_start,
            end: self.ira_inferred_end,
            length: self.ira_inferred_length,
        }
    }

    fn blast_b(&self) -> IrAnnotation {
        IrAnnotation {
            present: self.irb_inferred,
            start: self.irb_inferred_start,
            end: self.irb_inferred_end,
            length: self.irb_inferred_length,
        }
    }
}

/// Outcome counters of one table-loading run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Well-formed availability rows seen.
    pub availability_rows: usize,
    /// Well-formed IR-stats rows seen.
    pub ir_rows: usize,
    /// Rows skipped because they could not be deserialized or lacked an
    /// accession.
    pub malformed_rows: usize,
    /// Availability rows removed by the genus blocklist.
    pub blocklisted_rows: usize,
    /// Rows whose accession appeared in only one of the two tables.
    pub unmatched_rows: usize,
}

/// Read a genus blocklist, one genus per line, `#` starting a comment line.
pub fn read_blocklist<P>(path: P) -> Result<HashSet<String>, anyhow::Error>
where
    P: AsRef<Path>,
{
    let reader = BufReader::new(open_read_maybe_gz(path)?);
    let mut result = HashSet::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        result.insert(line.to_string());
    }
    Ok(result)
}

/// Extract the genus from a semicolon-separated taxonomy lineage.
fn genus_of(taxonomy: &str) -> Option<&str> {
    taxonomy
        .split(';')
        .last()
        .map(|genus| genus.trim().trim_end_matches('.'))
        .filter(|genus| !genus.is_empty())
}

/// Load both tables and inner-join them on the accession key.
///
/// Rows whose accession appears in only one table never reach the result.
/// The record order follows the IR-stats table and is independent of any
/// hashing, so repeated runs yield identical output.
pub fn load_records<P, Q>(
    path_availability: P,
    path_ir_stats: Q,
    blocklist: &HashSet<String>,
) -> Result<(Vec<GenomeRecord>, LoadStats), anyhow::Error>
where
    P: AsRef<Path> + std::fmt::Debug,
    Q: AsRef<Path> + std::fmt::Debug,
{
    let mut stats = LoadStats::default();

    let mut availability: IndexMap<String, AvailabilityRecord> = IndexMap::new();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(open_read_maybe_gz(&path_availability).map_err(|e| {
            anyhow::anyhow!("could not open {:?} for reading: {}", &path_availability, e)
        })?);
    for result in reader.deserialize() {
        let row: AvailabilityRecord = match result {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!("skipping malformed availability row: {}", err);
                stats.malformed_rows += 1;
                continue;
            }
        };
        if row.accession.trim().is_empty() {
            tracing::warn!("skipping availability row without accession");
            stats.malformed_rows += 1;
            continue;
        }
        stats.availability_rows += 1;
        if let Some(genus) = row.taxonomy.as_deref().and_then(genus_of) {
            if blocklist.contains(genus) {
                tracing::debug!("dropping blocklisted accession {}", &row.accession);
                stats.blocklisted_rows += 1;
                continue;
            }
        }
        availability.insert(row.accession.clone(), row);
    }

    let mut records = Vec::new();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(open_read_maybe_gz(&path_ir_stats).map_err(|e| {
            anyhow::anyhow!("could not open {:?} for reading: {}", &path_ir_stats, e)
        })?);
    for result in reader.deserialize() {
        let row: IrStatsRecord = match result {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!("skipping malformed IR-stats row: {}", err);
                stats.malformed_rows += 1;
                continue;
            }
        };
        if row.accession.trim().is_empty() {
            tracing::warn!("skipping IR-stats row without accession");
            stats.malformed_rows += 1;
            continue;
        }
        stats.ir_rows += 1;
        let Some(entry) = availability.swap_remove(&row.accession) else {
            stats.unmatched_rows += 1;
            continue;
        };
        records.push(GenomeRecord {
            accession: row.accession.clone(),
            create_date: entry.create_date,
            reference: entry.reference,
            sequence_version: entry.version,
            reported_a: row.reported_a(),
            reported_b: row.reported_b(),
            blast_a: row.blast_a(),
            blast_b: row.blast_b(),
        });
    }

    stats.unmatched_rows += availability.len();

    Ok((records, stats))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use std::collections::HashSet;

    #[rstest]
    #[case("26090", Some(26090))]
    #[case(" 26090 ", Some(26090))]
    #[case("<26090", Some(26090))]
    #[case(">1", Some(1))]
    #[case("n.a.", None)]
    #[case("", None)]
    #[case("26090.5", None)]
    fn parse_lenient_int(#[case] value: &str, #[case] expected: Option<i64>) {
        assert_eq!(super::parse_lenient_int(value), expected);
    }

    #[rstest]
    #[case("1", Some(1))]
    #[case("3", Some(3))]
    #[case("0", None)]
    #[case("-1", None)]
    #[case("n.a.", None)]
    fn parse_lenient_version(#[case] value: &str, #[case] expected: Option<u32>) {
        assert_eq!(super::parse_lenient_version(value), expected);
    }

    #[rstest]
    #[case("2015-03-10", Some((2015, 3, 10)))]
    #[case("05/01/2016", Some((2016, 1, 5)))]
    #[case("n.a.", None)]
    #[case("2015-13-10", None)]
    #[case("", None)]
    fn parse_lenient_date(#[case] value: &str, #[case] expected: Option<(i32, u32, u32)>) {
        let expected =
            expected.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("valid date"));
        assert_eq!(super::parse_lenient_date(value), expected);
    }

    #[rstest]
    #[case("Viridiplantae; Brassicaceae; Arabidopsis.", Some("Arabidopsis"))]
    #[case("Arabidopsis", Some("Arabidopsis"))]
    #[case("", None)]
    fn genus_of(#[case] taxonomy: &str, #[case] expected: Option<&str>) {
        assert_eq!(super::genus_of(taxonomy), expected);
    }

    fn write_fixture(dir: &std::path::Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).expect("writing fixture");
        path
    }

    const AVAILABILITY: &str = "\
UID\tACCESSION\tVERSION\tORGANISM\tCREATE_DATE\tREFERENCE\tTAXONOMY\n\
1000\tNC_000001\t1\tArabidopsis thaliana\t2015-03-10\tPlant J. 12: 1-10\tViridiplantae; Brassicaceae; Arabidopsis.\n\
1001\tNC_000002\t1\tOryza sativa\t22/07/2015\tUnpublished\tViridiplantae; Poaceae; Oryza.\n\
1002\tNC_000006\t1\tEpifagus virginiana\t2016-02-14\tUnpublished\tViridiplantae; Orobanchaceae; Epifagus.\n\
1003\tNC_000007\t1\tNicotiana tabacum\t2016-11-02\tPlant J. 3: 7-12\tViridiplantae; Solanaceae; Nicotiana.\n";

    const IR_STATS_BASIC: &str = "\
ACCESSION\tIRa_REPORTED\tIRa_REPORTED_START\tIRa_REPORTED_END\tIRa_REPORTED_LENGTH\tIRb_REPORTED\tIRb_REPORTED_START\tIRb_REPORTED_END\tIRb_REPORTED_LENGTH\n\
NC_000001\tyes\t84170\t110259\t26090\tyes\t128215\t154304\t26090\n\
NC_000002\tno\tn.a.\tn.a.\tn.a.\tno\tn.a.\tn.a.\tn.a.\n\
NC_000006\tyes\t1\t22000\t22000\tyes\t40000\t62000\t22000\n\
NC_000099\tyes\t1\t25500\t25500\tyes\t30000\t55500\t25500\n";

    #[test]
    fn load_records_inner_join() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path_availability = write_fixture(&tmp_dir, "availability.tsv", AVAILABILITY);
        let path_ir_stats = write_fixture(&tmp_dir, "ir-stats.tsv", IR_STATS_BASIC);

        let (records, stats) =
            super::load_records(&path_availability, &path_ir_stats, &HashSet::new())?;

        // NC_000007 lacks an IR-stats row, NC_000099 an availability row.
        let accessions: Vec<&str> = records.iter().map(|r| r.accession.as_str()).collect();
        assert_eq!(accessions, vec!["NC_000001", "NC_000002", "NC_000006"]);
        assert_eq!(stats.availability_rows, 4);
        assert_eq!(stats.ir_rows, 4);
        assert_eq!(stats.unmatched_rows, 2);
        assert_eq!(stats.malformed_rows, 0);
        assert_eq!(stats.blocklisted_rows, 0);

        let first = &records[0];
        assert_eq!(
            first.create_date,
            NaiveDate::from_ymd_opt(2015, 3, 10)
        );
        assert_eq!(first.reference, "Plant J. 12: 1-10");
        assert_eq!(first.sequence_version, Some(1));
        assert!(first.reported_a.present);
        assert_eq!(first.reported_a.length, Some(26090));
        // Basic table: no inference columns, arms default to absent.
        assert!(!first.blast_a.present);
        assert_eq!(first.blast_a.length, None);

        let second = &records[1];
        assert_eq!(
            second.create_date,
            NaiveDate::from_ymd_opt(2015, 7, 22)
        );
        assert!(!second.reported_a.present);
        assert_eq!(second.reported_a.length, None);

        Ok(())
    }

    #[test]
    fn load_records_applies_blocklist() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path_availability = write_fixture(&tmp_dir, "availability.tsv", AVAILABILITY);
        let path_ir_stats = write_fixture(&tmp_dir, "ir-stats.tsv", IR_STATS_BASIC);
        let path_blocklist =
            write_fixture(&tmp_dir, "blocklist.txt", "# IR-lacking genera\nEpifagus\n");

        let blocklist = super::read_blocklist(&path_blocklist)?;
        assert_eq!(blocklist, HashSet::from([String::from("Epifagus")]));

        let (records, stats) =
            super::load_records(&path_availability, &path_ir_stats, &blocklist)?;

        let accessions: Vec<&str> = records.iter().map(|r| r.accession.as_str()).collect();
        assert_eq!(accessions, vec!["NC_000001", "NC_000002"]);
        assert_eq!(stats.blocklisted_rows, 1);
        // The blocklisted accession's IR row now counts as unmatched.
        assert_eq!(stats.unmatched_rows, 3);

        Ok(())
    }

    #[test]
    fn load_records_counts_malformed_rows() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let availability = "\
ACCESSION\tCREATE_DATE\tREFERENCE\tVERSION\n\
NC_000001\t2015-03-10\tUnpublished\t1\n\
only-one-field\n\
\t2015-03-10\tUnpublished\t1\n";
        let ir_stats = "\
ACCESSION\tIRa_REPORTED\tIRa_REPORTED_LENGTH\tIRb_REPORTED\tIRb_REPORTED_LENGTH\n\
NC_000001\tyes\t26090\tyes\t26090\n\
NC_000002\tyes\n";
        let path_availability = write_fixture(&tmp_dir, "availability.tsv", availability);
        let path_ir_stats = write_fixture(&tmp_dir, "ir-stats.tsv", ir_stats);

        let (records, stats) =
            super::load_records(&path_availability, &path_ir_stats, &HashSet::new())?;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].accession, "NC_000001");
        assert_eq!(stats.availability_rows, 1);
        assert_eq!(stats.ir_rows, 1);
        assert_eq!(stats.malformed_rows, 3);
        assert_eq!(stats.unmatched_rows, 0);

        Ok(())
    }

    #[test]
    fn load_records_parses_fuzzy_positions() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let availability = "\
ACCESSION\tCREATE_DATE\tREFERENCE\tVERSION\n\
NC_000001\t2015-03-10\tUnpublished\t1\n";
        let ir_stats = "\
ACCESSION\tIRa_REPORTED\tIRa_REPORTED_START\tIRa_REPORTED_END\tIRa_REPORTED_LENGTH\tIRb_REPORTED\tIRb_REPORTED_START\tIRb_REPORTED_END\tIRb_REPORTED_LENGTH\n\
NC_000001\tYES\t<84170\t110259\t26090\tyes\t128215\t>154304\tn.a.\n";
        let path_availability = write_fixture(&tmp_dir, "availability.tsv", availability);
        let path_ir_stats = write_fixture(&tmp_dir, "ir-stats.tsv", ir_stats);

        let (records, _) =
            super::load_records(&path_availability, &path_ir_stats, &HashSet::new())?;

        assert_eq!(records.len(), 1);
        assert!(records[0].reported_a.present);
        assert_eq!(records[0].reported_a.start, Some(84170));
        assert_eq!(records[0].reported_b.end, Some(154304));
        assert_eq!(records[0].reported_b.length, None);

        Ok(())
    }
}
