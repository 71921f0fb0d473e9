//! Grouping of classified records and normalization to percentage shares.
//!
//! The denominator scopes (by year, by publication status, by sequence
//! version) all share one shape: within a group key, the totals across both
//! flag values sum to the denominator.  Scope selection therefore happens in
//! the key extractor passed by the caller, not in per-scope code paths.

use std::collections::BTreeMap;
use std::fmt::Debug;

/// Error type for aggregation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A group whose totals sum to zero has no defined percentages.
    #[error("denominator for group {0} is zero")]
    EmptyDenominator(String),
}

/// One normalized output bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket<K> {
    /// The categorical group key.
    pub key: K,
    /// The flag value within the group.
    pub flag: bool,
    /// Number of records in this bucket.
    pub total: u64,
    /// Share of the bucket within its group, in `[0, 1]`, three decimals.
    pub percentage: f64,
}

/// Count records per `(group key, flag)` bucket.
///
/// Every record contributes exactly one count to its bucket.  Records for
/// which either extractor yields `None` are left out of all buckets; the
/// caller can recover the dropped count from the difference against the
/// input length.
pub fn group_and_count<T, K, KF, FF>(records: &[T], key_fn: KF, flag_fn: FF) -> BTreeMap<(K, bool), u64>
where
    K: Ord,
    KF: Fn(&T) -> Option<K>,
    FF: Fn(&T) -> Option<bool>,
{
    let mut counts = BTreeMap::new();
    for record in records {
        let (Some(key), Some(flag)) = (key_fn(record), flag_fn(record)) else {
            continue;
        };
        *counts.entry((key, flag)).or_insert(0) += 1;
    }
    counts
}

/// Round a share to three decimal places, half up.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Normalize bucket counts to percentage shares of their group.
///
/// Fails on a group whose totals sum to zero; such input cannot come out of
/// `group_and_count` but is representable through the public bucket map.
pub fn normalize<K>(counts: &BTreeMap<(K, bool), u64>) -> Result<Vec<Bucket<K>>, Error>
where
    K: Ord + Clone + Debug,
{
    let mut denominators: BTreeMap<&K, u64> = BTreeMap::new();
    for ((key, _), total) in counts {
        *denominators.entry(key).or_insert(0) += *total;
    }

    counts
        .iter()
        .map(|((key, flag), total)| {
            let denominator = denominators[key];
            if denominator == 0 {
                return Err(Error::EmptyDenominator(format!("{:?}", key)));
            }
            Ok(Bucket {
                key: key.clone(),
                flag: *flag,
                total: *total,
                percentage: round3(*total as f64 / denominator as f64),
            })
        })
        .collect()
}
