//! Derivation of per-record classification flags.
//!
//! All functions here are pure; the only failure mode is an out-of-range
//! tolerance.  Comparisons involving an unset length classify as false, so
//! upstream parsing gaps degrade into negative flags instead of errors.

use rayon::prelude::*;

use crate::ir::schema::{ClassificationFlags, ClassifiedRecord, GenomeRecord, UNPUBLISHED};

/// Error type for flag derivation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The length tolerance must lie in the half-open interval `(0, 1]`.
    #[error("tolerance must be in (0, 1] but was {0}")]
    InvalidTolerance(f64),
}

/// Validate an optional tolerance without comparing anything.
pub fn validate_tolerance(tolerance: Option<f64>) -> Result<(), Error> {
    match tolerance {
        Some(t) if t <= 0.0 || t > 1.0 => Err(Error::InvalidTolerance(t)),
        _ => Ok(()),
    }
}

/// Exact length equality with unset values comparing as false.
fn lengths_equal_exact(lhs: Option<i64>, rhs: Option<i64>) -> bool {
    matches!((lhs, rhs), (Some(lhs), Some(rhs)) if lhs == rhs)
}

/// Compare two arm lengths for equality, optionally within a tolerance.
///
/// Without a tolerance, this is exact equality.  With a tolerance `t`, the
/// smaller length grown by its own `t`-fraction must reach the larger one.
/// That relation is not symmetric after scaling, so both directions are
/// checked explicitly.  Unset lengths compare as false before the tolerance
/// is validated.
pub fn lengths_equal(
    lhs: Option<i64>,
    rhs: Option<i64>,
    tolerance: Option<f64>,
) -> Result<bool, Error> {
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        return Ok(false);
    };
    match tolerance {
        None => Ok(lhs == rhs),
        Some(t) => {
            validate_tolerance(Some(t))?;
            let (a, b) = (lhs as f64, rhs as f64);
            Ok(lhs == rhs
                || (lhs < rhs && a + a * t >= b)
                || (lhs > rhs && b + b * t >= a))
        }
    }
}

/// Whether the record carries a published reference.
pub fn is_published(reference: &str) -> bool {
    reference != UNPUBLISHED
}

/// Whether both reported arms are present with matching lengths.
///
/// The base congruence check uses exact equality (`tolerance == None`); a
/// tolerance widens the length comparison only when explicitly requested.
pub fn is_congruent(record: &GenomeRecord, tolerance: Option<f64>) -> Result<bool, Error> {
    Ok(record.reported_a.present
        && record.reported_b.present
        && lengths_equal(record.reported_a.length, record.reported_b.length, tolerance)?)
}

/// Whether the reported arms are confirmed by the inferred ones.
///
/// Defined only for records whose reported arms are congruent under exact
/// equality; returns `None` otherwise.  The per-arm comparison against the
/// inferred lengths is always exact, independent of any congruence
/// tolerance.
pub fn is_correctly_identified(record: &GenomeRecord) -> Option<bool> {
    if !(record.reported_a.present
        && record.reported_b.present
        && lengths_equal_exact(record.reported_a.length, record.reported_b.length))
    {
        return None;
    }
    Some(
        record.blast_a.present
            && record.blast_b.present
            && lengths_equal_exact(record.reported_a.length, record.blast_a.length)
            && lengths_equal_exact(record.reported_b.length, record.blast_b.length),
    )
}

/// Whether the inference found an IR pair that was never reported.
///
/// Defined only for records with no reported arm at all; returns `None` as
/// soon as either arm is reported.
pub fn ir_exists_unreported(
    record: &GenomeRecord,
    tolerance: Option<f64>,
) -> Result<Option<bool>, Error> {
    if record.reported_a.present || record.reported_b.present {
        return Ok(None);
    }
    Ok(Some(
        record.blast_a.present
            && record.blast_b.present
            && lengths_equal(record.blast_a.length, record.blast_b.length, tolerance)?,
    ))
}

/// Derive all classification flags for one record.
pub fn classify(record: &GenomeRecord, tolerance: Option<f64>) -> Result<ClassificationFlags, Error> {
    Ok(ClassificationFlags {
        is_published: is_published(&record.reference),
        is_congruent: is_congruent(record, tolerance)?,
        correctly_identified: is_correctly_identified(record),
        ir_exists_unreported: ir_exists_unreported(record, tolerance)?,
    })
}

/// Classify a whole record set in parallel.
///
/// The tolerance is validated up front so an out-of-range value fails the
/// run even when no record reaches a length comparison.
pub fn classify_records(
    records: Vec<GenomeRecord>,
    tolerance: Option<f64>,
) -> Result<Vec<ClassifiedRecord>, Error> {
    validate_tolerance(tolerance)?;
    records
        .into_par_iter()
        .map(|record| {
            classify(&record, tolerance).map(|flags| ClassifiedRecord { record, flags })
        })
        .collect()
}
