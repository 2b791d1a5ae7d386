// engine/src/diff.rs
//! Ordered merge-diff between a baseline sequence and a candidate sequence.
//!
//! Both inputs must be sorted ascending. Repeats are matched occurrence by
//! occurrence: a version that appears twice in the baseline and once in the
//! candidate leaves exactly one unmatched copy on the baseline side.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub equal: bool,
    pub base_len: usize,
    pub candidate_len: usize,
    /// Occurrences present in the baseline with no partner in the candidate.
    pub only_in_base: Vec<u64>,
    /// Occurrences present in the candidate with no partner in the baseline.
    pub only_in_candidate: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// The candidate lacks an occurrence the baseline has.
    MissingFromCandidate,
    /// The baseline lacks an occurrence the candidate has.
    ExtraInCandidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub version: u64,
    pub kind: DiscrepancyKind,
}

/// Two-pointer merge over `base` and `candidate`; linear in their lengths.
pub fn compare(base: &[u64], candidate: &[u64]) -> Comparison {
    debug_assert!(is_ascending(base), "baseline sequence is not sorted");
    debug_assert!(is_ascending(candidate), "candidate sequence is not sorted");

    let mut only_in_base = Vec::new();
    let mut only_in_candidate = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < base.len() && j < candidate.len() {
        match base[i].cmp(&candidate[j]) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                only_in_base.push(base[i]);
                i += 1;
            }
            Ordering::Greater => {
                only_in_candidate.push(candidate[j]);
                j += 1;
            }
        }
    }
    only_in_base.extend_from_slice(&base[i..]);
    only_in_candidate.extend_from_slice(&candidate[j..]);

    let equal =
        only_in_base.is_empty() && only_in_candidate.is_empty() && base.len() == candidate.len();

    Comparison {
        equal,
        base_len: base.len(),
        candidate_len: candidate.len(),
        only_in_base,
        only_in_candidate,
    }
}

impl Comparison {
    /// Both sides' unmatched occurrences, merged in version order. Where a
    /// version is unmatched on both sides (impossible for sorted input) the
    /// baseline side comes first.
    pub fn discrepancies(&self) -> Vec<Discrepancy> {
        let mut merged = Vec::with_capacity(self.only_in_base.len() + self.only_in_candidate.len());
        let mut missing = self.only_in_base.iter().peekable();
        let mut extra = self.only_in_candidate.iter().peekable();

        loop {
            let kind = match (missing.peek(), extra.peek()) {
                (Some(m), Some(e)) if m <= e => DiscrepancyKind::MissingFromCandidate,
                (Some(_), Some(_)) => DiscrepancyKind::ExtraInCandidate,
                (Some(_), None) => DiscrepancyKind::MissingFromCandidate,
                (None, Some(_)) => DiscrepancyKind::ExtraInCandidate,
                (None, None) => break,
            };
            let next = match kind {
                DiscrepancyKind::MissingFromCandidate => missing.next(),
                DiscrepancyKind::ExtraInCandidate => extra.next(),
            };
            if let Some(&version) = next {
                merged.push(Discrepancy { version, kind });
            }
        }

        merged
    }
}

fn is_ascending(values: &[u64]) -> bool {
    values.windows(2).all(|pair| pair[0] <= pair[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    #[test]
    fn identical_sequences_are_equal() {
        let result = compare(&[1, 2, 3], &[1, 2, 3]);
        assert!(result.equal);
        assert!(result.only_in_base.is_empty());
        assert!(result.only_in_candidate.is_empty());
        assert!(result.discrepancies().is_empty());
    }

    #[test]
    fn missing_version_is_only_in_base() {
        let result = compare(&[1, 2, 3], &[1, 3]);
        assert!(!result.equal);
        assert_eq!(result.only_in_base, vec![2]);
        assert!(result.only_in_candidate.is_empty());
    }

    #[test]
    fn missing_repeat_is_reported_once() {
        let result = compare(&[5, 5, 7], &[5, 7]);
        assert!(!result.equal);
        assert_eq!(result.only_in_base, vec![5]);
        assert!(result.only_in_candidate.is_empty());
        assert_eq!((result.base_len, result.candidate_len), (3, 2));
    }

    #[test]
    fn extra_repeat_in_candidate() {
        let result = compare(&[5, 7], &[5, 7, 7, 7]);
        assert!(!result.equal);
        assert!(result.only_in_base.is_empty());
        assert_eq!(result.only_in_candidate, vec![7, 7]);
    }

    #[test]
    fn empty_base_reports_every_candidate_version() {
        let result = compare(&[], &[4, 4, 9]);
        assert!(!result.equal);
        assert!(result.only_in_base.is_empty());
        assert_eq!(result.only_in_candidate, vec![4, 4, 9]);
    }

    #[test]
    fn empty_candidate_reports_every_base_version() {
        let result = compare(&[1, 8], &[]);
        assert!(!result.equal);
        assert_eq!(result.only_in_base, vec![1, 8]);
    }

    #[test]
    fn both_empty_is_equal() {
        let result = compare(&[], &[]);
        assert!(result.equal);
        assert_eq!((result.base_len, result.candidate_len), (0, 0));
    }

    #[test]
    fn interleaved_differences_on_both_sides() {
        let result = compare(&[1, 3, 5, 6], &[2, 3, 6, 9]);
        assert_eq!(result.only_in_base, vec![1, 5]);
        assert_eq!(result.only_in_candidate, vec![2, 9]);
        assert_eq!(
            result.discrepancies(),
            vec![
                Discrepancy {
                    version: 1,
                    kind: DiscrepancyKind::MissingFromCandidate,
                },
                Discrepancy {
                    version: 2,
                    kind: DiscrepancyKind::ExtraInCandidate,
                },
                Discrepancy {
                    version: 5,
                    kind: DiscrepancyKind::MissingFromCandidate,
                },
                Discrepancy {
                    version: 9,
                    kind: DiscrepancyKind::ExtraInCandidate,
                },
            ]
        );
    }

    fn counts(values: &[u64]) -> BTreeMap<u64, usize> {
        let mut counts = BTreeMap::new();
        for &value in values {
            *counts.entry(value).or_insert(0) += 1;
        }
        counts
    }

    fn sorted_vec() -> impl Strategy<Value = Vec<u64>> {
        prop::collection::vec(0u64..20, 0..40).prop_map(|mut values| {
            values.sort_unstable();
            values
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Unmatched occurrences are exactly the multiset difference on each side.
        #[test]
        fn prop_unmatched_is_multiset_difference(base in sorted_vec(), candidate in sorted_vec()) {
            let result = compare(&base, &candidate);
            let base_counts = counts(&base);
            let candidate_counts = counts(&candidate);

            let mut expected_base = Vec::new();
            let mut expected_candidate = Vec::new();
            for version in 0u64..20 {
                let b = base_counts.get(&version).copied().unwrap_or(0);
                let c = candidate_counts.get(&version).copied().unwrap_or(0);
                expected_base.extend(std::iter::repeat(version).take(b.saturating_sub(c)));
                expected_candidate.extend(std::iter::repeat(version).take(c.saturating_sub(b)));
            }

            prop_assert_eq!(&result.only_in_base, &expected_base);
            prop_assert_eq!(&result.only_in_candidate, &expected_candidate);
        }

        #[test]
        fn prop_equal_iff_identical(base in sorted_vec(), candidate in sorted_vec()) {
            let result = compare(&base, &candidate);
            prop_assert_eq!(result.equal, base == candidate);
        }

        #[test]
        fn prop_discrepancies_are_ordered(base in sorted_vec(), candidate in sorted_vec()) {
            let merged = compare(&base, &candidate).discrepancies();
            prop_assert!(merged.windows(2).all(|pair| pair[0].version <= pair[1].version));
        }
    }
}
