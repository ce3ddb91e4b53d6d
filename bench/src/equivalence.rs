//! Equivalence checking: diffs normalised strategy outputs against the first
//! (reference) strategy and reports every difference instead of a verdict.

use authors_core::types::{AuthorId, AuthorResult, BookResult};
use authors_core::BooksCountDrift;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// The answer one strategy produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyOutput {
    pub strategy: String,
    pub results: Vec<AuthorResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// In the reference answer but not the other.
    MissingAuthor,
    /// In the other answer but not the reference.
    ExtraAuthor,
    BookSetMismatch,
    /// Shared authors appear in a different order.
    OrderingMismatch,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingAuthor => "missing author",
            Self::ExtraAuthor => "extra author",
            Self::BookSetMismatch => "book set mismatch",
            Self::OrderingMismatch => "ordering mismatch",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// `"<reference>/<other>"`
    pub pair: String,
    pub kind: MismatchKind,
    pub author_id: Option<AuthorId>,
    pub detail: String,
}

/// Two adjacent authors in one answer where the one ranked higher by total
/// `books_count` has fewer books before the cutoff than the one below it.
///
/// Such answers depend on whether "top N by book count" means all books or
/// only qualifying ones; strategies may legitimately disagree on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingNote {
    pub strategy: String,
    pub higher: AuthorId,
    pub lower: AuthorId,
    pub higher_books_count: u32,
    pub lower_books_count: u32,
    pub higher_qualifying: usize,
    pub lower_qualifying: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EquivalenceReport {
    pub mismatches: Vec<Mismatch>,
    /// Cached `books_count` values that disagree with the data. Rankings by
    /// `books_count` are only meaningful when this is empty.
    pub warnings: Vec<BooksCountDrift>,
    pub ranking_notes: Vec<RankingNote>,
}

impl EquivalenceReport {
    /// True when every strategy matched the reference.
    pub fn is_equivalent(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn mismatches_for<'a>(&'a self, pair: &'a str) -> impl Iterator<Item = &'a Mismatch> {
        self.mismatches.iter().filter(move |m| m.pair == pair)
    }

    pub fn with_invariant_audit(mut self, drift: Vec<BooksCountDrift>) -> Self {
        self.warnings = drift;
        self
    }
}

pub struct EquivalenceChecker;

impl EquivalenceChecker {
    /// Compares every output with `outputs[0]`.
    pub fn check(outputs: &[StrategyOutput]) -> EquivalenceReport {
        let mut report = EquivalenceReport::default();
        let Some((reference, others)) = outputs.split_first() else {
            return report;
        };

        for output in outputs {
            report.ranking_notes.extend(ranking_notes(output));
        }
        for other in others {
            let pair = format!("{}/{}", reference.strategy, other.strategy);
            compare(&pair, &reference.results, &other.results, &mut report.mismatches);
        }

        if report.is_equivalent() {
            log::debug!("All {} strategy outputs are equivalent", outputs.len());
        } else {
            log::warn!(
                "{} mismatches across {} strategy outputs",
                report.mismatches.len(),
                outputs.len()
            );
        }
        report
    }
}

fn compare(
    pair: &str,
    reference: &[AuthorResult],
    other: &[AuthorResult],
    mismatches: &mut Vec<Mismatch>,
) {
    let reference_by_id: HashMap<AuthorId, &AuthorResult> =
        reference.iter().map(|r| (r.author_id, r)).collect();
    let other_by_id: HashMap<AuthorId, &AuthorResult> =
        other.iter().map(|r| (r.author_id, r)).collect();

    for result in reference {
        if !other_by_id.contains_key(&result.author_id) {
            mismatches.push(Mismatch {
                pair: pair.to_string(),
                kind: MismatchKind::MissingAuthor,
                author_id: Some(result.author_id),
                detail: format!(
                    "{} (books_count {}) is absent",
                    result.author_id, result.books_count
                ),
            });
        }
    }
    for result in other {
        if !reference_by_id.contains_key(&result.author_id) {
            mismatches.push(Mismatch {
                pair: pair.to_string(),
                kind: MismatchKind::ExtraAuthor,
                author_id: Some(result.author_id),
                detail: format!(
                    "{} (books_count {}) is not in the reference",
                    result.author_id, result.books_count
                ),
            });
        }
    }

    let shared_in_reference: Vec<AuthorId> = reference
        .iter()
        .map(|r| r.author_id)
        .filter(|id| other_by_id.contains_key(id))
        .collect();
    let shared_in_other: Vec<AuthorId> = other
        .iter()
        .map(|r| r.author_id)
        .filter(|id| reference_by_id.contains_key(id))
        .collect();
    if shared_in_reference != shared_in_other {
        mismatches.push(Mismatch {
            pair: pair.to_string(),
            kind: MismatchKind::OrderingMismatch,
            author_id: None,
            detail: format!(
                "expected [{}], got [{}]",
                join_ids(&shared_in_reference),
                join_ids(&shared_in_other)
            ),
        });
    }

    for id in &shared_in_reference {
        let expected = reference_by_id[id].normalized_books();
        let actual = other_by_id[id].normalized_books();
        if expected != actual {
            mismatches.push(Mismatch {
                pair: pair.to_string(),
                kind: MismatchKind::BookSetMismatch,
                author_id: Some(*id),
                detail: describe_book_diff(&expected, &actual),
            });
        }
    }
}

fn ranking_notes(output: &StrategyOutput) -> Vec<RankingNote> {
    output
        .results
        .windows(2)
        .filter(|w| w[0].books_count >= w[1].books_count && w[0].books.len() < w[1].books.len())
        .map(|w| RankingNote {
            strategy: output.strategy.clone(),
            higher: w[0].author_id,
            lower: w[1].author_id,
            higher_books_count: w[0].books_count,
            lower_books_count: w[1].books_count,
            higher_qualifying: w[0].books.len(),
            lower_qualifying: w[1].books.len(),
        })
        .collect()
}

fn join_ids(ids: &[AuthorId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_book_diff(expected: &[BookResult], actual: &[BookResult]) -> String {
    let label = |b: &BookResult| format!("{} ({})", b.name, b.published);
    let expected_set: BTreeSet<String> = expected.iter().map(label).collect();
    let actual_set: BTreeSet<String> = actual.iter().map(label).collect();
    let missing: Vec<_> = expected_set.difference(&actual_set).cloned().collect();
    let extra: Vec<_> = actual_set.difference(&expected_set).cloned().collect();

    if missing.is_empty() && extra.is_empty() {
        // Same titles, different multiplicity.
        format!("expected {} books, got {}", expected.len(), actual.len())
    } else {
        format!("missing [{}], extra [{}]", missing.join(", "), extra.join(", "))
    }
}
