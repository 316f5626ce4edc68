//! Boundary planning: decide where to cut the source document.
//!
//! Everything in this module is a pure function of the page count and the
//! outline — no I/O, no hidden state — so the same inputs always give the
//! same boundaries.
//!
//! ## Strategies
//!
//! * **Bookmark** — cut at every top-level outline entry. Chapters stay
//!   whole, so tables and lists are never split mid-structure.
//! * **Fixed** — for flat documents: sweep in `max_chunk_pages` steps, moving
//!   each next start back by `overlap_pages` so content straddling a cut is
//!   seen whole by at least one chunk.
//! * **Hybrid** — bookmark or fixed cuts, oversized sections subdivided,
//!   then runs of tiny chunks folded together.
//! * **Enhanced** — the shallowest outline level whose sections all fit.
//! * **Smart** — bookmarks when they are balanced, hybrid otherwise.
//!
//! ## Consolidation direction
//!
//! A chunk shorter than `min_chunk_pages` absorbs its successor(s) until it
//! is long enough. The last chunk may stay short.

use crate::error::SplitterError;
use crate::output::Boundary;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const DEFAULT_MAX_CHUNK_PAGES: usize = 100;
pub const DEFAULT_MIN_CHUNK_PAGES: usize = 15;
pub const DEFAULT_OVERLAP_PAGES: usize = 0;

/// Bookmark chunks may exceed `max_chunk_pages` by this factor before
/// smart selection rejects them.
const BALANCE_TOLERANCE: f64 = 1.5;

/// One outline (bookmark) entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    pub title: String,
    /// Depth in the outline tree; top-level entries are level 0.
    pub level: usize,
    /// Zero-based destination page, `None` when it does not resolve.
    pub page: Option<usize>,
}

impl OutlineEntry {
    pub fn new(title: impl Into<String>, level: usize, page: Option<usize>) -> Self {
        Self {
            title: title.into(),
            level,
            page,
        }
    }
}

/// Which planner the caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Strategy {
    Fixed,
    Bookmark,
    Hybrid,
    Enhanced,
    /// Pick automatically (default).
    #[default]
    Smart,
}

/// Which planner actually produced a [`SplitPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppliedStrategy {
    Empty,
    SinglePage,
    Fixed,
    Bookmark,
    /// `from_bookmarks` is false when the outline was unusable.
    Hybrid { from_bookmarks: bool },
    Enhanced { level: usize },
}

impl fmt::Display for AppliedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppliedStrategy::Empty => write!(f, "empty"),
            AppliedStrategy::SinglePage => write!(f, "single-page"),
            AppliedStrategy::Fixed => write!(f, "fixed"),
            AppliedStrategy::Bookmark => write!(f, "bookmark"),
            AppliedStrategy::Hybrid {
                from_bookmarks: true,
            } => write!(f, "hybrid (bookmarks)"),
            AppliedStrategy::Hybrid {
                from_bookmarks: false,
            } => write!(f, "hybrid (fixed)"),
            AppliedStrategy::Enhanced { level } => write!(f, "enhanced (level {level})"),
        }
    }
}

/// Planner knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOptions {
    pub max_chunk_pages: usize,
    pub min_chunk_pages: usize,
    pub overlap_pages: usize,
    pub strategy: Strategy,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            max_chunk_pages: DEFAULT_MAX_CHUNK_PAGES,
            min_chunk_pages: DEFAULT_MIN_CHUNK_PAGES,
            overlap_pages: DEFAULT_OVERLAP_PAGES,
            strategy: Strategy::default(),
        }
    }
}

impl PlanOptions {
    /// Reject option combinations the planner cannot honour.
    pub fn validate(&self) -> Result<(), SplitterError> {
        if self.max_chunk_pages < 1 {
            return Err(SplitterError::InvalidConfig(format!(
                "max-pages must be >= 1, got {}",
                self.max_chunk_pages
            )));
        }
        if self.min_chunk_pages < 1 {
            return Err(SplitterError::InvalidConfig(format!(
                "min-pages must be >= 1, got {}",
                self.min_chunk_pages
            )));
        }
        if self.overlap_pages >= self.max_chunk_pages {
            return Err(SplitterError::InvalidConfig(format!(
                "overlap ({}) must be smaller than max-pages ({})",
                self.overlap_pages, self.max_chunk_pages
            )));
        }
        Ok(())
    }
}

/// The boundaries for one document and how they were obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub total_pages: usize,
    pub boundaries: Vec<Boundary>,
    pub strategy: AppliedStrategy,
}

impl SplitPlan {
    pub fn num_chunks(&self) -> usize {
        self.boundaries.len()
    }

    pub fn min_chunk_size(&self) -> usize {
        self.boundaries.iter().map(Boundary::len).min().unwrap_or(0)
    }

    pub fn max_chunk_size(&self) -> usize {
        self.boundaries.iter().map(Boundary::len).max().unwrap_or(0)
    }

    pub fn avg_chunk_size(&self) -> f64 {
        if self.boundaries.is_empty() {
            return 0.0;
        }
        let total: usize = self.boundaries.iter().map(Boundary::len).sum();
        total as f64 / self.boundaries.len() as f64
    }

    /// Every page of the document belongs to at least one boundary.
    pub fn covers_all_pages(&self) -> bool {
        covers_all_pages(&self.boundaries, self.total_pages)
    }

    /// One-paragraph description for terminal output.
    pub fn summary(&self) -> String {
        format!(
            "Strategy: {}\nTotal pages: {}\nChunks: {}\nChunk size: min {}, max {}, avg {:.1}",
            self.strategy,
            self.total_pages,
            self.num_chunks(),
            self.min_chunk_size(),
            self.max_chunk_size(),
            self.avg_chunk_size()
        )
    }
}

/// Plan boundaries from top-level bookmarks (or a fixed sweep when there are
/// none), then fold chunks shorter than `min_chunk_pages` forward.
pub fn plan(
    page_count: usize,
    outline: Option<&[OutlineEntry]>,
    max_chunk_pages: usize,
    min_chunk_pages: usize,
    overlap_pages: usize,
) -> Vec<Boundary> {
    if let Some(trivial) = trivial_boundaries(page_count) {
        return trivial;
    }
    let derived = outline
        .map(|o| bookmark_boundaries(page_count, top_level_pages(o)))
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| fixed_boundaries(page_count, max_chunk_pages, overlap_pages));
    consolidate(derived, min_chunk_pages)
}

/// Plan boundaries with the strategy named in `options`.
pub fn plan_with(
    page_count: usize,
    outline: Option<&[OutlineEntry]>,
    options: &PlanOptions,
) -> SplitPlan {
    let (boundaries, strategy) = match trivial_boundaries(page_count) {
        Some(b) if page_count == 0 => (b, AppliedStrategy::Empty),
        Some(b) => (b, AppliedStrategy::SinglePage),
        None => match options.strategy {
            Strategy::Fixed => (
                fixed_boundaries(page_count, options.max_chunk_pages, options.overlap_pages),
                AppliedStrategy::Fixed,
            ),
            Strategy::Bookmark => bookmark_or_fixed(page_count, outline, options),
            Strategy::Hybrid => hybrid(page_count, outline, options),
            Strategy::Enhanced => enhanced(page_count, outline, options)
                .unwrap_or_else(|| hybrid(page_count, outline, options)),
            Strategy::Smart => smart(page_count, outline, options),
        },
    };
    SplitPlan {
        total_pages: page_count,
        boundaries,
        strategy,
    }
}

fn trivial_boundaries(page_count: usize) -> Option<Vec<Boundary>> {
    match page_count {
        0 => Some(Vec::new()),
        1 => Some(vec![Boundary::new(0, 1)]),
        _ => None,
    }
}

fn bookmark_or_fixed(
    page_count: usize,
    outline: Option<&[OutlineEntry]>,
    options: &PlanOptions,
) -> (Vec<Boundary>, AppliedStrategy) {
    let bookmarks = outline
        .map(|o| bookmark_boundaries(page_count, top_level_pages(o)))
        .unwrap_or_default();
    if bookmarks.is_empty() {
        (
            fixed_boundaries(page_count, options.max_chunk_pages, options.overlap_pages),
            AppliedStrategy::Fixed,
        )
    } else {
        (bookmarks, AppliedStrategy::Bookmark)
    }
}

fn hybrid(
    page_count: usize,
    outline: Option<&[OutlineEntry]>,
    options: &PlanOptions,
) -> (Vec<Boundary>, AppliedStrategy) {
    let (derived, applied) = bookmark_or_fixed(page_count, outline, options);
    let from_bookmarks = applied == AppliedStrategy::Bookmark;
    let sized = if from_bookmarks {
        subdivide(derived, options.max_chunk_pages, options.overlap_pages)
    } else {
        derived
    };
    (
        consolidate(sized, options.min_chunk_pages),
        AppliedStrategy::Hybrid { from_bookmarks },
    )
}

/// The shallowest outline level whose sections all fit in `max_chunk_pages`.
fn enhanced(
    page_count: usize,
    outline: Option<&[OutlineEntry]>,
    options: &PlanOptions,
) -> Option<(Vec<Boundary>, AppliedStrategy)> {
    let outline = outline?;
    let levels: BTreeSet<usize> = outline.iter().map(|e| e.level).collect();
    levels.into_iter().find_map(|level| {
        let pages = outline
            .iter()
            .filter(|e| e.level <= level)
            .filter_map(|e| e.page);
        let boundaries = bookmark_boundaries(page_count, pages);
        let fits = boundaries
            .iter()
            .all(|b| b.len() <= options.max_chunk_pages);
        (!boundaries.is_empty() && fits).then(|| {
            (
                consolidate(boundaries, options.min_chunk_pages),
                AppliedStrategy::Enhanced { level },
            )
        })
    })
}

fn smart(
    page_count: usize,
    outline: Option<&[OutlineEntry]>,
    options: &PlanOptions,
) -> (Vec<Boundary>, AppliedStrategy) {
    let bookmarks = outline
        .map(|o| bookmark_boundaries(page_count, top_level_pages(o)))
        .unwrap_or_default();
    let limit = (options.max_chunk_pages as f64 * BALANCE_TOLERANCE).floor() as usize;
    let balanced = bookmarks.iter().all(|b| b.len() <= limit);
    if !bookmarks.is_empty() && balanced {
        (bookmarks, AppliedStrategy::Bookmark)
    } else {
        hybrid(page_count, outline, options)
    }
}

fn top_level_pages(outline: &[OutlineEntry]) -> impl Iterator<Item = usize> + '_ {
    outline
        .iter()
        .filter(|e| e.level == 0)
        .filter_map(|e| e.page)
}

/// Cut at each distinct in-range page, always including page 0.
///
/// Returns an empty list when no page is in range.
pub fn bookmark_boundaries(
    page_count: usize,
    pages: impl IntoIterator<Item = usize>,
) -> Vec<Boundary> {
    let mut starts: BTreeSet<usize> = pages.into_iter().filter(|&p| p < page_count).collect();
    if starts.is_empty() {
        return Vec::new();
    }
    starts.insert(0);

    let starts: Vec<usize> = starts.into_iter().collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(page_count);
            Boundary::new(start, end)
        })
        .collect()
}

/// Fixed-size sweep over the whole document.
pub fn fixed_boundaries(page_count: usize, max_chunk_pages: usize, overlap_pages: usize) -> Vec<Boundary> {
    sweep(0, page_count, max_chunk_pages, overlap_pages)
}

/// Fixed-size sweep over `[from, to)`. Stops early if the start pointer
/// would not advance (`overlap >= max`).
fn sweep(from: usize, to: usize, max_chunk_pages: usize, overlap_pages: usize) -> Vec<Boundary> {
    let step = max_chunk_pages.max(1);
    let mut boundaries = Vec::new();
    let mut start = from;

    while start < to {
        let end = (start + step).min(to);
        boundaries.push(Boundary::new(start, end));
        if end >= to {
            break;
        }
        let next = end.saturating_sub(overlap_pages);
        if next <= start {
            break;
        }
        start = next;
    }

    boundaries
}

/// Split every boundary longer than `max_chunk_pages` with a fixed sweep.
fn subdivide(boundaries: Vec<Boundary>, max_chunk_pages: usize, overlap_pages: usize) -> Vec<Boundary> {
    boundaries
        .into_iter()
        .flat_map(|b| {
            if b.len() > max_chunk_pages {
                sweep(b.start, b.end, max_chunk_pages, overlap_pages)
            } else {
                vec![b]
            }
        })
        .collect()
}

/// Fold chunks shorter than `min_chunk_pages` into their successors.
pub fn consolidate(boundaries: Vec<Boundary>, min_chunk_pages: usize) -> Vec<Boundary> {
    let mut merged = Vec::with_capacity(boundaries.len());
    let mut rest = boundaries.into_iter();

    while let Some(mut current) = rest.next() {
        while current.len() < min_chunk_pages {
            match rest.next() {
                Some(next) => current.end = current.end.max(next.end),
                None => break,
            }
        }
        merged.push(current);
    }

    merged
}

/// Every page in `[0, total_pages)` belongs to some boundary.
pub fn covers_all_pages(boundaries: &[Boundary], total_pages: usize) -> bool {
    let mut sorted = boundaries.to_vec();
    sorted.sort();
    let mut covered_to = 0;
    for b in sorted {
        if b.start > covered_to {
            return false;
        }
        covered_to = covered_to.max(b.end);
    }
    covered_to >= total_pages
}

/// Per-level outline statistics, for `analyze`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineLevel {
    pub level: usize,
    pub count: usize,
    pub unique_pages: usize,
    pub sample_titles: Vec<String>,
}

/// Summarise the outline level by level.
pub fn outline_levels(outline: &[OutlineEntry]) -> Vec<OutlineLevel> {
    let mut by_level: BTreeMap<usize, (usize, BTreeSet<usize>, Vec<String>)> = BTreeMap::new();
    for entry in outline {
        let (count, pages, titles) = by_level.entry(entry.level).or_default();
        *count += 1;
        if let Some(p) = entry.page {
            pages.insert(p);
        }
        if titles.len() < 3 {
            titles.push(entry.title.clone());
        }
    }
    by_level
        .into_iter()
        .map(|(level, (count, pages, sample_titles))| OutlineLevel {
            level,
            count,
            unique_pages: pages.len(),
            sample_titles,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(start: usize, end: usize) -> Boundary {
        Boundary::new(start, end)
    }

    fn top(pages: &[usize]) -> Vec<OutlineEntry> {
        pages
            .iter()
            .map(|&p| OutlineEntry::new(format!("Chapter at {p}"), 0, Some(p)))
            .collect()
    }

    #[test]
    fn empty_and_single_page_documents() {
        assert!(plan(0, None, 50, 1, 5).is_empty());
        assert_eq!(plan(1, None, 50, 1, 5), vec![b(0, 1)]);
        let p = plan_with(1, None, &PlanOptions::default());
        assert_eq!(p.strategy, AppliedStrategy::SinglePage);
    }

    #[test]
    fn fixed_sweep_with_overlap_on_120_pages() {
        assert_eq!(
            plan(120, None, 50, 1, 5),
            vec![b(0, 50), b(45, 95), b(90, 120)]
        );
    }

    #[test]
    fn bookmarks_define_chapters() {
        let outline = top(&[0, 40, 95]);
        assert_eq!(
            plan(120, Some(&outline), 50, 1, 5),
            vec![b(0, 40), b(40, 95), b(95, 120)]
        );
    }

    #[test]
    fn bookmark_page_zero_is_inserted_and_duplicates_dropped() {
        let outline = top(&[95, 40, 40]);
        assert_eq!(
            plan(120, Some(&outline), 50, 1, 0),
            vec![b(0, 40), b(40, 95), b(95, 120)]
        );
    }

    #[test]
    fn unresolvable_and_nested_entries_are_skipped() {
        let outline = vec![
            OutlineEntry::new("broken", 0, None),
            OutlineEntry::new("past the end", 0, Some(500)),
            OutlineEntry::new("nested", 1, Some(10)),
        ];
        // Nothing usable at the top level: fixed sweep instead.
        assert_eq!(
            plan(60, Some(&outline), 25, 1, 0),
            vec![b(0, 25), b(25, 50), b(50, 60)]
        );
    }

    #[test]
    fn sweep_aborts_when_start_cannot_advance() {
        assert_eq!(fixed_boundaries(20, 5, 5), vec![b(0, 5)]);
        assert_eq!(fixed_boundaries(20, 5, 9), vec![b(0, 5)]);
    }

    #[test]
    fn consolidation_folds_forward_and_leaves_last_short() {
        let merged = consolidate(vec![b(0, 3), b(3, 5), b(5, 30), b(30, 32)], 10);
        assert_eq!(merged, vec![b(0, 30), b(30, 32)]);
    }

    #[test]
    fn consolidation_handles_overlapping_ranges() {
        let merged = consolidate(vec![b(0, 4), b(2, 8), b(6, 20)], 5);
        assert_eq!(merged, vec![b(0, 8), b(6, 20)]);
    }

    #[test]
    fn fixed_mode_covers_every_page() {
        for pages in 2..=130 {
            for max in 1..=12 {
                for overlap in 0..max {
                    for min in [1, 3, 7] {
                        let bounds = plan(pages, None, max, min, overlap);
                        assert!(
                            covers_all_pages(&bounds, pages),
                            "gap: pages={pages} max={max} min={min} overlap={overlap}: {bounds:?}"
                        );
                        assert!(bounds.iter().all(|x| !x.is_empty()));
                        assert!(bounds.windows(2).all(|w| w[0].start < w[1].start));
                        assert!(bounds.iter().all(|x| x.end <= pages));
                    }
                }
            }
        }
    }

    #[test]
    fn planning_is_idempotent() {
        let outline = top(&[0, 12, 33, 80]);
        let options = PlanOptions {
            max_chunk_pages: 30,
            min_chunk_pages: 5,
            overlap_pages: 2,
            strategy: Strategy::Hybrid,
        };
        let first = plan_with(100, Some(&outline), &options);
        let second = plan_with(100, Some(&outline), &options);
        assert_eq!(first, second);
    }

    #[test]
    fn hybrid_subdivides_oversized_chapters() {
        let outline = top(&[0, 10, 90]);
        let options = PlanOptions {
            max_chunk_pages: 30,
            min_chunk_pages: 5,
            overlap_pages: 0,
            strategy: Strategy::Hybrid,
        };
        let p = plan_with(100, Some(&outline), &options);
        assert_eq!(
            p.boundaries,
            vec![b(0, 10), b(10, 40), b(40, 70), b(70, 90), b(90, 100)]
        );
        assert_eq!(p.strategy, AppliedStrategy::Hybrid { from_bookmarks: true });
        assert!(p.covers_all_pages());
    }

    #[test]
    fn smart_prefers_balanced_bookmarks() {
        let outline = top(&[0, 40, 95]);
        let options = PlanOptions {
            max_chunk_pages: 50,
            min_chunk_pages: 5,
            overlap_pages: 0,
            strategy: Strategy::Smart,
        };
        let p = plan_with(120, Some(&outline), &options);
        assert_eq!(p.strategy, AppliedStrategy::Bookmark);
        assert_eq!(p.boundaries, vec![b(0, 40), b(40, 95), b(95, 120)]);
    }

    #[test]
    fn smart_falls_back_when_one_chapter_dominates() {
        let outline = top(&[0, 10]);
        let options = PlanOptions {
            max_chunk_pages: 20,
            min_chunk_pages: 5,
            overlap_pages: 0,
            strategy: Strategy::Smart,
        };
        let p = plan_with(200, Some(&outline), &options);
        assert_eq!(p.strategy, AppliedStrategy::Hybrid { from_bookmarks: true });
        assert!(p.max_chunk_size() <= 20);
        assert!(p.covers_all_pages());
    }

    #[test]
    fn smart_without_outline_is_fixed_hybrid() {
        let p = plan_with(120, None, &PlanOptions::default());
        assert_eq!(p.strategy, AppliedStrategy::Hybrid { from_bookmarks: false });
        assert_eq!(p.boundaries, vec![b(0, 100), b(100, 120)]);
    }

    #[test]
    fn enhanced_descends_until_sections_fit() {
        let outline = vec![
            OutlineEntry::new("Part I", 0, Some(0)),
            OutlineEntry::new("1.1", 1, Some(20)),
            OutlineEntry::new("1.2", 1, Some(45)),
            OutlineEntry::new("Part II", 0, Some(60)),
            OutlineEntry::new("2.1", 1, Some(90)),
        ];
        let options = PlanOptions {
            max_chunk_pages: 30,
            min_chunk_pages: 1,
            overlap_pages: 0,
            strategy: Strategy::Enhanced,
        };
        let p = plan_with(110, Some(&outline), &options);
        assert_eq!(p.strategy, AppliedStrategy::Enhanced { level: 1 });
        assert_eq!(
            p.boundaries,
            vec![b(0, 20), b(20, 45), b(45, 60), b(60, 90), b(90, 110)]
        );
    }

    #[test]
    fn plan_statistics_and_summary() {
        let p = plan_with(
            120,
            None,
            &PlanOptions {
                max_chunk_pages: 50,
                min_chunk_pages: 1,
                overlap_pages: 5,
                strategy: Strategy::Fixed,
            },
        );
        assert_eq!(p.num_chunks(), 3);
        assert_eq!(p.min_chunk_size(), 30);
        assert_eq!(p.max_chunk_size(), 50);
        assert!((p.avg_chunk_size() - 130.0 / 3.0).abs() < 1e-9);
        assert!(p.summary().contains("fixed"));
    }

    #[test]
    fn options_validation() {
        let mut o = PlanOptions::default();
        assert!(o.validate().is_ok());
        o.max_chunk_pages = 0;
        assert!(o.validate().is_err());
        o.max_chunk_pages = 10;
        o.overlap_pages = 10;
        assert!(o.validate().is_err());
        o.overlap_pages = 0;
        o.min_chunk_pages = 0;
        assert!(o.validate().is_err());
    }

    #[test]
    fn outline_level_statistics() {
        let outline = vec![
            OutlineEntry::new("A", 0, Some(0)),
            OutlineEntry::new("A.1", 1, Some(3)),
            OutlineEntry::new("A.2", 1, Some(3)),
            OutlineEntry::new("B", 0, Some(9)),
        ];
        let levels = outline_levels(&outline);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].count, 2);
        assert_eq!(levels[1].count, 2);
        assert_eq!(levels[1].unique_pages, 1);
        assert_eq!(levels[0].sample_titles, vec!["A", "B"]);
    }
}
