//! Coverage validation of conversion results.
//!
//! Diagnostic only: nothing here changes results or stops a run. Each chunk
//! is checked against the page count its boundary promises, using the
//! chunk-relative provenance pages its document reports. Global checks look
//! for missing ordinals, gaps between boundaries, a low mean coverage and,
//! when a merged document is supplied, provenance that runs backwards.

use crate::document::{ProvenanceSource, StructuredDocument};
use crate::output::{Boundary, ConversionResult};
use crate::pipeline::merge::{merge_statistics, DocumentStats};
use crate::pipeline::split::parse_chunk_file_name;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Thresholds for [`validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Per-chunk coverage below this is flagged (if enough pages are missing).
    pub min_chunk_coverage: f64,
    /// Mean coverage across chunks below this is flagged.
    pub min_mean_coverage: f64,
    /// Fraction of a chunk's pages that may be missing before low coverage
    /// counts as a finding.
    pub max_missing_fraction: f64,
    /// Also flag chunk files that no longer exist on disk.
    pub check_artifacts: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_chunk_coverage: 0.9,
            min_mean_coverage: 0.8,
            max_missing_fraction: 0.1,
            check_artifacts: false,
        }
    }
}

/// One problem found by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    ConversionFailed { ordinal: usize, reason: String },
    NoContent { ordinal: usize },
    PagesOutOfRange { ordinal: usize, pages: Vec<usize>, expected: usize },
    LowCoverage { ordinal: usize, coverage: f64, missing: usize, expected: usize },
    BoundaryMismatch { ordinal: usize, planned: Boundary, recorded: Boundary },
    ArtifactMissing { ordinal: usize, path: PathBuf },
    MissingChunks { ordinals: Vec<usize> },
    LowMeanCoverage { mean: f64 },
    Gap { from: usize, to: usize },
    NonMonotonic { position: usize, previous: usize, current: usize, regressions: usize },
}

impl Finding {
    /// The chunk the finding is about, for per-chunk findings.
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            Finding::ConversionFailed { ordinal, .. }
            | Finding::NoContent { ordinal }
            | Finding::PagesOutOfRange { ordinal, .. }
            | Finding::LowCoverage { ordinal, .. }
            | Finding::BoundaryMismatch { ordinal, .. }
            | Finding::ArtifactMissing { ordinal, .. } => Some(*ordinal),
            _ => None,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::ConversionFailed { reason, .. } => f.write_str(reason),
            Finding::NoContent { ordinal } => write!(f, "chunk {ordinal}: no content extracted"),
            Finding::PagesOutOfRange {
                ordinal,
                pages,
                expected,
            } => write!(
                f,
                "chunk {ordinal}: provenance pages {pages:?} outside 1..={expected}"
            ),
            Finding::LowCoverage {
                ordinal,
                coverage,
                missing,
                expected,
            } => write!(
                f,
                "chunk {ordinal}: coverage {:.0}% ({missing}/{expected} pages missing)",
                coverage * 100.0
            ),
            Finding::BoundaryMismatch {
                ordinal,
                planned,
                recorded,
            } => write!(
                f,
                "chunk {ordinal}: result records pages {recorded}, plan says {planned}"
            ),
            Finding::ArtifactMissing { ordinal, path } => {
                write!(f, "chunk {ordinal}: file not found: {}", path.display())
            }
            Finding::MissingChunks { ordinals } => write!(f, "missing chunk ordinals {ordinals:?}"),
            Finding::LowMeanCoverage { mean } => {
                write!(f, "mean page coverage is low: {:.1}%", mean * 100.0)
            }
            Finding::Gap { from, to } => write!(f, "pages [{from}, {to}) are in no chunk"),
            Finding::NonMonotonic {
                position,
                previous,
                current,
                regressions,
            } => write!(
                f,
                "merged provenance goes backwards: page {current} follows page {previous} \
                 at position {position} ({regressions} regression(s))"
            ),
        }
    }
}

/// Per-chunk verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkValidation {
    pub ordinal: usize,
    pub chunk_name: String,
    pub boundary: Boundary,
    /// Distinct chunk-relative provenance pages, sorted.
    pub observed_pages: Vec<usize>,
    /// Fraction of `1..=boundary.len()` that appears in `observed_pages`.
    pub coverage: f64,
    pub stats: Option<DocumentStats>,
    pub valid: bool,
}

/// Everything [`validate`] found.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub chunks: Vec<ChunkValidation>,
    pub findings: Vec<Finding>,
    /// Mean coverage over chunks that produced a document.
    pub mean_coverage: f64,
    /// `None` when no merged document was checked.
    pub monotonic: Option<bool>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn valid_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.valid).count()
    }

    /// Findings not tied to a single chunk.
    pub fn global_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.ordinal().is_none())
    }

    pub fn findings_for(&self, ordinal: usize) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(move |f| f.ordinal() == Some(ordinal))
    }
}

/// Recover `(ordinal, boundary)` pairs from results alone.
///
/// The chunk file name is authoritative; a result whose name does not parse
/// falls back to its recorded `start_page`/`end_page`. Sorted by ordinal.
pub fn boundaries_from_results(results: &[ConversionResult]) -> Vec<(usize, Boundary)> {
    let mut recovered: Vec<(usize, Boundary)> = results
        .iter()
        .map(|r| match parse_chunk_file_name(&r.chunk_name()) {
            Some((ordinal, boundary)) => (ordinal, boundary),
            None => {
                debug!("Chunk name '{}' does not parse; using recorded range", r.chunk_name());
                (r.ordinal, r.boundary())
            }
        })
        .collect();
    recovered.sort_by_key(|(ordinal, _)| *ordinal);
    recovered.dedup_by_key(|(ordinal, _)| *ordinal);
    recovered
}

/// Validate `results` against the planned `boundaries` (indexed by ordinal).
pub fn validate(
    boundaries: &[Boundary],
    results: &[ConversionResult],
    merged: Option<&StructuredDocument>,
    config: &ValidationConfig,
) -> ValidationReport {
    let planned: BTreeMap<usize, Boundary> = boundaries.iter().copied().enumerate().collect();
    validate_against(&planned, results, merged, config)
}

/// Validate a persisted results file without the plan, using
/// [`boundaries_from_results`].
pub fn audit(
    results: &[ConversionResult],
    merged: Option<&StructuredDocument>,
    config: &ValidationConfig,
) -> ValidationReport {
    let recovered: BTreeMap<usize, Boundary> = boundaries_from_results(results).into_iter().collect();
    validate_against(&recovered, results, merged, config)
}

fn validate_against(
    expected: &BTreeMap<usize, Boundary>,
    results: &[ConversionResult],
    merged: Option<&StructuredDocument>,
    config: &ValidationConfig,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut ordered: Vec<&ConversionResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.ordinal);

    for result in ordered {
        let chunk = validate_chunk(expected, result, config, &mut report.findings);
        report.chunks.push(chunk);
    }

    // ── Global checks ────────────────────────────────────────────────────
    let with_document: Vec<f64> = report
        .chunks
        .iter()
        .filter(|c| c.stats.is_some())
        .map(|c| c.coverage)
        .collect();
    if !with_document.is_empty() {
        report.mean_coverage = with_document.iter().sum::<f64>() / with_document.len() as f64;
    }

    let seen: BTreeSet<usize> = results.iter().map(|r| r.ordinal).collect();
    let upper = expected.keys().chain(seen.iter()).max().copied();
    if let Some(upper) = upper {
        let missing: Vec<usize> = (0..=upper).filter(|o| !seen.contains(o)).collect();
        if !missing.is_empty() {
            report.findings.push(Finding::MissingChunks { ordinals: missing });
        }
    }

    if !with_document.is_empty() && report.mean_coverage < config.min_mean_coverage {
        report.findings.push(Finding::LowMeanCoverage {
            mean: report.mean_coverage,
        });
    }

    report.findings.extend(find_gaps(expected.values().copied()));

    if let Some(doc) = merged {
        let finding = check_monotonic(doc);
        report.monotonic = Some(finding.is_none());
        report.findings.extend(finding);
    }

    if report.passed() {
        info!(
            "Validation passed: {} chunks, mean coverage {:.1}%",
            report.chunks.len(),
            report.mean_coverage * 100.0
        );
    } else {
        for finding in &report.findings {
            warn!("Validation: {finding}");
        }
    }
    report
}

fn validate_chunk(
    expected: &BTreeMap<usize, Boundary>,
    result: &ConversionResult,
    config: &ValidationConfig,
    findings: &mut Vec<Finding>,
) -> ChunkValidation {
    let ordinal = result.ordinal;
    let recorded = result.boundary();
    let boundary = match expected.get(&ordinal) {
        Some(&planned) => {
            if planned != recorded {
                findings.push(Finding::BoundaryMismatch {
                    ordinal,
                    planned,
                    recorded,
                });
            }
            planned
        }
        None => recorded,
    };

    if config.check_artifacts && !result.chunk_path.exists() {
        findings.push(Finding::ArtifactMissing {
            ordinal,
            path: result.chunk_path.clone(),
        });
    }

    let mut chunk = ChunkValidation {
        ordinal,
        chunk_name: result.chunk_name(),
        boundary,
        observed_pages: Vec::new(),
        coverage: 0.0,
        stats: None,
        valid: false,
    };

    if !result.success {
        findings.push(Finding::ConversionFailed {
            ordinal,
            reason: result
                .error
                .clone()
                .unwrap_or_else(|| format!("Chunk {ordinal}: conversion failed")),
        });
        return chunk;
    }
    let Some(doc) = result.document.as_ref() else {
        findings.push(Finding::NoContent { ordinal });
        return chunk;
    };

    let expected_pages = boundary.len();
    let observed: BTreeSet<usize> = doc.provenance_pages().into_iter().collect();
    let in_range = observed
        .iter()
        .filter(|&&p| (1..=expected_pages).contains(&p))
        .count();
    let outside: Vec<usize> = observed
        .iter()
        .copied()
        .filter(|&p| !(1..=expected_pages).contains(&p))
        .collect();
    let missing = expected_pages - in_range;

    chunk.observed_pages = observed.into_iter().collect();
    chunk.coverage = if expected_pages > 0 {
        in_range as f64 / expected_pages as f64
    } else {
        0.0
    };
    chunk.stats = Some(merge_statistics(doc));
    chunk.valid = true;

    if doc.item_count() == 0 {
        findings.push(Finding::NoContent { ordinal });
        chunk.valid = false;
    }
    if !outside.is_empty() {
        findings.push(Finding::PagesOutOfRange {
            ordinal,
            pages: outside,
            expected: expected_pages,
        });
        chunk.valid = false;
    }
    if chunk.coverage < config.min_chunk_coverage
        && missing as f64 > expected_pages as f64 * config.max_missing_fraction
    {
        findings.push(Finding::LowCoverage {
            ordinal,
            coverage: chunk.coverage,
            missing,
            expected: expected_pages,
        });
        chunk.valid = false;
    }
    chunk
}

/// `None` when the provenance sequence never decreases.
fn check_monotonic(doc: &impl ProvenanceSource) -> Option<Finding> {
    let pages = doc.provenance_pages();
    let mut first = None;
    let mut regressions = 0;
    for (i, pair) in pages.windows(2).enumerate() {
        if pair[1] < pair[0] {
            regressions += 1;
            first.get_or_insert((i + 1, pair[0], pair[1]));
        }
    }
    first.map(|(position, previous, current)| Finding::NonMonotonic {
        position,
        previous,
        current,
        regressions,
    })
}

/// Uncovered stretches between the first boundary start and the last end.
/// A range nested inside an earlier, longer one never opens a gap.
fn find_gaps(boundaries: impl IntoIterator<Item = Boundary>) -> Vec<Finding> {
    let mut ranges: Vec<Boundary> = boundaries.into_iter().collect();
    ranges.sort();

    let mut gaps = Vec::new();
    let mut ranges = ranges.into_iter();
    let Some(first) = ranges.next() else {
        return gaps;
    };
    let mut covered_to = first.end;
    for b in ranges {
        if b.start > covered_to {
            gaps.push(Finding::Gap {
                from: covered_to,
                to: b.start,
            });
        }
        covered_to = covered_to.max(b.end);
    }
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocItem, ItemLabel};
    use crate::output::{ChunkArtifact, ConversionOutcome};
    use crate::pipeline::split::chunk_file_name;

    fn doc(pages: &[usize]) -> StructuredDocument {
        let mut d = StructuredDocument::new("d");
        for &p in pages {
            d.items.push(DocItem::on_page(ItemLabel::Text, "t", p));
        }
        d
    }

    fn result(ordinal: usize, boundary: Boundary, outcome: ConversionOutcome) -> ConversionResult {
        let artifact = ChunkArtifact {
            ordinal,
            boundary,
            path: PathBuf::from("/tmp/chunks").join(chunk_file_name(ordinal, boundary)),
        };
        ConversionResult::from_outcome(&artifact, outcome)
    }

    fn full(ordinal: usize, boundary: Boundary) -> ConversionResult {
        let pages: Vec<usize> = (1..=boundary.len()).collect();
        result(ordinal, boundary, ConversionOutcome::ok(doc(&pages)))
    }

    fn plan() -> Vec<Boundary> {
        vec![Boundary::new(0, 10), Boundary::new(10, 20), Boundary::new(20, 25)]
    }

    #[test]
    fn complete_results_pass() {
        let b = plan();
        let results: Vec<_> = b.iter().enumerate().map(|(i, &bd)| full(i, bd)).collect();
        let report = validate(&b, &results, None, &ValidationConfig::default());
        assert!(report.passed(), "{:?}", report.findings);
        assert_eq!(report.valid_chunks(), 3);
        assert!((report.mean_coverage - 1.0).abs() < 1e-9);
        assert_eq!(report.monotonic, None);
    }

    #[test]
    fn small_gaps_in_coverage_are_tolerated() {
        // 1 of 10 pages missing: exactly 10 %, not more.
        let b = vec![Boundary::new(0, 10)];
        let r = result(0, b[0], ConversionOutcome::ok(doc(&[1, 2, 3, 4, 5, 6, 7, 8, 9])));
        let report = validate(&b, &[r], None, &ValidationConfig::default());
        assert!(report.passed(), "{:?}", report.findings);
        assert!((report.chunks[0].coverage - 0.9).abs() < 1e-9);
    }

    #[test]
    fn low_coverage_and_out_of_range_pages_are_flagged() {
        let b = vec![Boundary::new(0, 10)];
        let r = result(0, b[0], ConversionOutcome::ok(doc(&[1, 2, 3, 12])));
        let report = validate(&b, &[r], None, &ValidationConfig::default());

        assert!(!report.chunks[0].valid);
        assert!(report.findings.contains(&Finding::PagesOutOfRange {
            ordinal: 0,
            pages: vec![12],
            expected: 10
        }));
        assert!(report
            .findings
            .iter()
            .any(|f| matches!(f, Finding::LowCoverage { ordinal: 0, missing: 7, .. })));
        assert!(report
            .findings
            .iter()
            .any(|f| matches!(f, Finding::LowMeanCoverage { .. })));
    }

    #[test]
    fn failures_and_empty_documents_are_flagged() {
        let b = plan();
        let results = vec![
            full(0, b[0]),
            result(1, b[1], ConversionOutcome::failed("worker crashed")),
            result(2, b[2], ConversionOutcome::ok(doc(&[]))),
        ];
        let report = validate(&b, &results, None, &ValidationConfig::default());
        assert_eq!(report.valid_chunks(), 1);
        assert!(report.findings_for(1).any(|f| matches!(f, Finding::ConversionFailed { .. })));
        assert!(report.findings_for(2).any(|f| *f == Finding::NoContent { ordinal: 2 }));
        // Mean only counts chunks that produced a document: (1.0 + 0.0) / 2.
        assert!((report.mean_coverage - 0.5).abs() < 1e-9);
    }

    #[test]
    fn missing_ordinals_and_gaps_are_global_findings() {
        let b = vec![Boundary::new(0, 10), Boundary::new(12, 20), Boundary::new(20, 30)];
        let results = vec![full(0, b[0]), full(2, b[2])];
        let report = validate(&b, &results, None, &ValidationConfig::default());

        let global: Vec<&Finding> = report.global_findings().collect();
        assert!(global.contains(&&Finding::MissingChunks { ordinals: vec![1] }));
        assert!(global.contains(&&Finding::Gap { from: 10, to: 12 }));
    }

    #[test]
    fn nested_ranges_do_not_open_gaps() {
        let b = vec![Boundary::new(0, 100), Boundary::new(10, 20), Boundary::new(50, 60)];
        assert!(find_gaps(b).is_empty());

        let b = vec![Boundary::new(0, 30), Boundary::new(5, 10), Boundary::new(40, 50)];
        assert_eq!(find_gaps(b), vec![Finding::Gap { from: 30, to: 40 }]);
    }

    #[test]
    fn conversion_failure_reads_once_per_chunk() {
        let b = plan();
        let results = vec![
            full(0, b[0]),
            result(1, b[1], ConversionOutcome::failed("out of memory")),
            full(2, b[2]),
        ];
        let report = validate(&b, &results, None, &ValidationConfig::default());
        let messages: Vec<String> = report.findings_for(1).map(|f| f.to_string()).collect();
        assert_eq!(messages, vec!["Chunk 1: conversion failed: out of memory"]);
    }

    #[test]
    fn recorded_range_disagreeing_with_plan_is_flagged() {
        let b = plan();
        let results = vec![full(0, b[0]), full(1, Boundary::new(10, 19)), full(2, b[2])];
        let report = validate(&b, &results, None, &ValidationConfig::default());
        assert!(report
            .findings
            .iter()
            .any(|f| matches!(f, Finding::BoundaryMismatch { ordinal: 1, .. })));
    }

    #[test]
    fn merged_provenance_must_not_go_backwards() {
        let b = plan();
        let results: Vec<_> = b.iter().enumerate().map(|(i, &bd)| full(i, bd)).collect();

        let good = doc(&[1, 1, 2, 5, 5, 9]);
        let report = validate(&b, &results, Some(&good), &ValidationConfig::default());
        assert_eq!(report.monotonic, Some(true));

        let bad = doc(&[1, 3, 2, 4, 1]);
        let report = validate(&b, &results, Some(&bad), &ValidationConfig::default());
        assert_eq!(report.monotonic, Some(false));
        assert!(report.findings.contains(&Finding::NonMonotonic {
            position: 2,
            previous: 3,
            current: 2,
            regressions: 2
        }));
    }

    #[test]
    fn boundaries_recover_from_chunk_names() {
        let mut unnamed = full(1, Boundary::new(10, 20));
        unnamed.chunk_path = PathBuf::from("/tmp/renamed.pdf");
        let results = vec![full(2, Boundary::new(20, 25)), unnamed, full(0, Boundary::new(0, 10))];

        assert_eq!(
            boundaries_from_results(&results),
            vec![
                (0, Boundary::new(0, 10)),
                (1, Boundary::new(10, 20)),
                (2, Boundary::new(20, 25)),
            ]
        );
    }

    #[test]
    fn audit_without_plan_finds_missing_chunk() {
        let results = vec![full(0, Boundary::new(0, 10)), full(2, Boundary::new(20, 30))];
        let report = audit(&results, None, &ValidationConfig::default());
        assert!(report
            .findings
            .contains(&Finding::MissingChunks { ordinals: vec![1] }));
        assert!(report.findings.contains(&Finding::Gap { from: 10, to: 20 }));
    }

    #[test]
    fn missing_artifact_is_flagged_when_requested() {
        let b = vec![Boundary::new(0, 10)];
        let results = vec![full(0, b[0])];
        let config = ValidationConfig {
            check_artifacts: true,
            ..ValidationConfig::default()
        };
        let report = validate(&b, &results, None, &config);
        assert!(report
            .findings
            .iter()
            .any(|f| matches!(f, Finding::ArtifactMissing { ordinal: 0, .. })));
    }

    #[test]
    fn findings_serialize_with_kind_tag() {
        let v = serde_json::to_value(Finding::Gap { from: 3, to: 5 }).unwrap();
        assert_eq!(v["kind"], "gap");
        assert_eq!(v["from"], 3);
    }
}
