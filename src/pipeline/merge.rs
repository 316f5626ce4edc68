//! Reassembly: fold per-chunk documents into one source-relative document.
//!
//! Chunk documents number their pages from 1. Folding left to right, each
//! document's provenance pages are shifted by the pages consumed so far, so
//! `[1,2,3] + [1,2] + [1,2,3,4]` becomes `[1..=9]`. A document's page count
//! is its declared `page_count` when present, else its highest provenance
//! page. [`merge`] fills in undeclared counts from each result's page range
//! first, so a chunk ending on blank pages still advances the offset by its
//! full length.

use crate::document::{ItemLabel, ProvenanceSource, StructuredDocument};
use crate::error::MergeError;
use crate::output::{Boundary, ConversionResult};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// Merge the successful results, in ordinal order.
///
/// Failed results and successes without a document are skipped. A single
/// usable document is returned unchanged. A document that does not declare
/// its page count is taken to span its result's whole page range.
pub fn merge(results: &[ConversionResult]) -> Result<StructuredDocument, MergeError> {
    let mut usable: Vec<(usize, &StructuredDocument, Boundary)> = results
        .iter()
        .filter_map(|r| match (&r.document, r.success) {
            (Some(doc), true) => Some((r.ordinal, doc, r.boundary())),
            (None, true) => {
                warn!("Skipping chunk {}: succeeded without a document", r.ordinal);
                None
            }
            _ => {
                debug!(
                    "Skipping chunk {}: {}",
                    r.ordinal,
                    r.error.as_deref().unwrap_or("failed")
                );
                None
            }
        })
        .collect();
    usable.sort_by_key(|(ordinal, _, _)| *ordinal);

    let skipped = results.len() - usable.len();
    if skipped > 0 {
        warn!("Merging without {} of {} chunks", skipped, results.len());
    }

    match usable.as_slice() {
        [] => {
            let err = MergeError::NoValidInput {
                total: results.len(),
            };
            error!("{err}");
            Err(err)
        }
        [(_, only, _)] => {
            info!("Single document, passing through unchanged");
            Ok((*only).clone())
        }
        docs => {
            let counted: Vec<(usize, Cow<'_, StructuredDocument>)> = docs
                .iter()
                .map(|&(ordinal, doc, boundary)| (ordinal, with_range_page_count(doc, boundary)))
                .collect();
            let refs: Vec<(usize, &StructuredDocument)> = counted
                .iter()
                .map(|(ordinal, doc)| (*ordinal, doc.as_ref()))
                .collect();
            merge_documents(&refs).inspect_err(|e| error!("{e}"))
        }
    }
}

fn with_range_page_count(doc: &StructuredDocument, range: Boundary) -> Cow<'_, StructuredDocument> {
    if doc.page_count.is_some() || range.is_empty() {
        return Cow::Borrowed(doc);
    }
    let mut counted = doc.clone();
    counted.page_count = Some(range.len());
    Cow::Owned(counted)
}

/// Fold `(ordinal, document)` pairs, already in order, into one document.
///
/// The result takes the first document's schema, version and name, and
/// declares the total page count consumed.
pub fn merge_documents(
    docs: &[(usize, &StructuredDocument)],
) -> Result<StructuredDocument, MergeError> {
    let Some(&(first_ordinal, first)) = docs.first() else {
        return Err(MergeError::NoValidInput { total: 0 });
    };
    check_declared_pages(first_ordinal, first)?;

    let mut merged = first.clone();
    let mut offset = first.effective_page_count();

    for &(ordinal, doc) in &docs[1..] {
        if doc.schema_name != merged.schema_name {
            return Err(MergeError::Conflict {
                ordinal,
                reason: format!(
                    "schema '{}' does not match '{}'",
                    doc.schema_name, merged.schema_name
                ),
            });
        }
        check_declared_pages(ordinal, doc)?;

        let mut shifted = doc.clone();
        shifted.offset_pages(offset);
        debug!(
            "Chunk {}: {} items, page offset {}",
            ordinal,
            shifted.items.len(),
            offset
        );
        merged.items.extend(shifted.items);
        offset += doc.effective_page_count();
    }

    merged.page_count = Some(offset);
    info!(
        "Merged {} documents: {} items over {} pages",
        docs.len(),
        merged.item_count(),
        offset
    );
    Ok(merged)
}

fn check_declared_pages(ordinal: usize, doc: &StructuredDocument) -> Result<(), MergeError> {
    let Some(declared) = doc.page_count else {
        return Ok(());
    };
    match doc.provenance_pages().into_iter().find(|&p| p > declared) {
        Some(page) => Err(MergeError::Conflict {
            ordinal,
            reason: format!("provenance page {page} is beyond the declared {declared} pages"),
        }),
        None => Ok(()),
    }
}

/// Content totals of a (merged) document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub total_items: usize,
    pub text_items: usize,
    pub tables: usize,
    pub pictures: usize,
    pub other_items: usize,
    pub unique_pages: usize,
    /// Lowest and highest provenance page.
    pub page_range: Option<(usize, usize)>,
}

/// Count items by kind and summarise the pages they come from.
pub fn merge_statistics(doc: &StructuredDocument) -> DocumentStats {
    let mut stats = DocumentStats::default();
    for (item, _) in doc.iter_items() {
        stats.total_items += 1;
        match item.label {
            ItemLabel::Table => stats.tables += 1,
            ItemLabel::Picture => stats.pictures += 1,
            label if label.is_textual() => stats.text_items += 1,
            _ => stats.other_items += 1,
        }
    }

    let pages: BTreeSet<usize> = doc.provenance_pages().into_iter().collect();
    stats.unique_pages = pages.len();
    stats.page_range = pages.first().copied().zip(pages.last().copied());
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocItem;
    use crate::output::{Boundary, ChunkArtifact, ConversionOutcome};
    use std::path::PathBuf;

    fn doc_with_pages(name: &str, pages: &[usize]) -> StructuredDocument {
        let mut doc = StructuredDocument::new(name);
        for &p in pages {
            doc.items
                .push(DocItem::on_page(ItemLabel::Text, format!("p{p}"), p));
        }
        doc
    }

    /// A result whose page range is exactly as long as the document.
    fn result(ordinal: usize, outcome: ConversionOutcome) -> ConversionResult {
        let pages = outcome
            .document
            .as_ref()
            .map_or(10, StructuredDocument::effective_page_count);
        ranged(ordinal, Boundary::new(ordinal * 10, ordinal * 10 + pages), outcome)
    }

    fn ranged(ordinal: usize, boundary: Boundary, outcome: ConversionOutcome) -> ConversionResult {
        let artifact = ChunkArtifact {
            ordinal,
            boundary,
            path: PathBuf::from(format!("chunk_{ordinal}.pdf")),
        };
        ConversionResult::from_outcome(&artifact, outcome)
    }

    #[test]
    fn offsets_follow_consumed_pages() {
        let results = vec![
            result(0, ConversionOutcome::ok(doc_with_pages("a", &[1, 2, 3]))),
            result(1, ConversionOutcome::ok(doc_with_pages("b", &[1, 2]))),
            result(2, ConversionOutcome::ok(doc_with_pages("c", &[1, 2, 3, 4]))),
        ];
        let merged = merge(&results).unwrap();
        assert_eq!(merged.provenance_pages(), (1..=9).collect::<Vec<_>>());
        assert_eq!(merged.page_count, Some(9));
        assert_eq!(merged.name, "a");
    }

    #[test]
    fn declared_page_count_wins_over_highest_provenance() {
        let mut middle = doc_with_pages("b", &[1, 2]);
        middle.page_count = Some(3);
        let results = vec![
            result(0, ConversionOutcome::ok(doc_with_pages("a", &[1, 2, 3]))),
            result(1, ConversionOutcome::ok(middle)),
            result(2, ConversionOutcome::ok(doc_with_pages("c", &[1, 2, 3, 4]))),
        ];
        let merged = merge(&results).unwrap();
        assert_eq!(merged.provenance_pages(), vec![1, 2, 3, 4, 5, 7, 8, 9, 10]);
        assert_eq!(merged.page_count, Some(10));
    }

    #[test]
    fn undeclared_count_spans_the_chunk_range() {
        // Page 3 of the first chunk is blank.
        let results = vec![
            ranged(0, Boundary::new(0, 3), ConversionOutcome::ok(doc_with_pages("a", &[1, 2]))),
            ranged(1, Boundary::new(3, 5), ConversionOutcome::ok(doc_with_pages("b", &[1, 2]))),
        ];
        let merged = merge(&results).unwrap();
        assert_eq!(merged.provenance_pages(), vec![1, 2, 4, 5]);
        assert_eq!(merged.page_count, Some(5));
    }

    #[test]
    fn documents_alone_fall_back_to_highest_page() {
        let a = doc_with_pages("a", &[1, 2]);
        let b = doc_with_pages("b", &[1, 2]);
        let merged = merge_documents(&[(0, &a), (1, &b)]).unwrap();
        assert_eq!(merged.provenance_pages(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn results_are_merged_in_ordinal_order() {
        let results = vec![
            result(1, ConversionOutcome::ok(doc_with_pages("b", &[1]))),
            result(0, ConversionOutcome::ok(doc_with_pages("a", &[1, 2]))),
        ];
        let merged = merge(&results).unwrap();
        let texts: Vec<_> = merged.items.iter().filter_map(|i| i.text.clone()).collect();
        assert_eq!(texts, vec!["p1", "p2", "p1"]);
        assert_eq!(merged.provenance_pages(), vec![1, 2, 3]);
    }

    #[test]
    fn single_document_passes_through_unchanged() {
        let mut only = doc_with_pages("only", &[2, 1, 5]);
        only.version = Some("1.0.0".into());
        let results = vec![
            result(0, ConversionOutcome::failed("boom")),
            result(1, ConversionOutcome::ok(only.clone())),
        ];
        assert_eq!(merge(&results).unwrap(), only);
    }

    #[test]
    fn failed_results_are_skipped() {
        let results = vec![
            result(0, ConversionOutcome::ok(doc_with_pages("a", &[1, 2]))),
            result(1, ConversionOutcome::failed("worker crashed")),
            result(2, ConversionOutcome::ok(doc_with_pages("c", &[1]))),
        ];
        let merged = merge(&results).unwrap();
        assert_eq!(merged.provenance_pages(), vec![1, 2, 3]);
    }

    #[test]
    fn nothing_usable_is_an_error() {
        assert_eq!(merge(&[]), Err(MergeError::NoValidInput { total: 0 }));

        let mut empty_success = result(0, ConversionOutcome::ok(StructuredDocument::new("x")));
        empty_success.document = None;
        let results = vec![empty_success, result(1, ConversionOutcome::failed("boom"))];
        assert_eq!(merge(&results), Err(MergeError::NoValidInput { total: 2 }));
    }

    #[test]
    fn schema_mismatch_is_a_conflict() {
        let mut other = doc_with_pages("b", &[1]);
        other.schema_name = "SomethingElse".into();
        let results = vec![
            result(0, ConversionOutcome::ok(doc_with_pages("a", &[1]))),
            result(1, ConversionOutcome::ok(other)),
        ];
        match merge(&results) {
            Err(MergeError::Conflict { ordinal, reason }) => {
                assert_eq!(ordinal, 1);
                assert!(reason.contains("SomethingElse"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn provenance_beyond_declared_count_is_a_conflict() {
        let mut bad = doc_with_pages("b", &[1, 4]);
        bad.page_count = Some(2);
        let results = vec![
            result(0, ConversionOutcome::ok(doc_with_pages("a", &[1]))),
            result(3, ConversionOutcome::ok(bad)),
        ];
        assert!(matches!(
            merge(&results),
            Err(MergeError::Conflict { ordinal: 3, .. })
        ));
    }

    #[test]
    fn statistics_count_kinds_and_pages() {
        let mut doc = doc_with_pages("d", &[3, 1, 3]);
        doc.items.push(DocItem::on_page(ItemLabel::Table, "t", 7));
        doc.items.push(DocItem::on_page(ItemLabel::Picture, "", 7));
        doc.items.push(DocItem::on_page(ItemLabel::Group, "", 2));

        let stats = merge_statistics(&doc);
        assert_eq!(stats.total_items, 6);
        assert_eq!(stats.text_items, 3);
        assert_eq!(stats.tables, 1);
        assert_eq!(stats.pictures, 1);
        assert_eq!(stats.other_items, 1);
        assert_eq!(stats.unique_pages, 4);
        assert_eq!(stats.page_range, Some((1, 7)));

        assert_eq!(merge_statistics(&StructuredDocument::new("e")).page_range, None);
    }
}
