//! The structured document produced by the conversion service.
//!
//! The pipeline never interprets a converted chunk beyond two questions:
//! *which content items does it hold* and *which pages do they come from*.
//! [`StructuredDocument`] models exactly that much of a Docling-style
//! document (a tree of labelled items carrying `prov` records) and lets
//! everything else the backend emits stay out of the way. Merge and
//! validation code only talk to it through [`ProvenanceSource`], so a thin
//! adapter over a richer schema can stand in for it.

use serde::{Deserialize, Serialize};

/// Schema name written by converters that do not declare one.
pub const DEFAULT_SCHEMA_NAME: &str = "DoclingDocument";

fn default_schema_name() -> String {
    DEFAULT_SCHEMA_NAME.to_string()
}

/// A converted chunk (page numbers chunk-relative) or a merged document
/// (page numbers source-relative).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDocument {
    /// Schema identifier. Documents with different schemas cannot be merged.
    #[serde(default = "default_schema_name")]
    pub schema_name: String,

    /// Schema version reported by the converter, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Document name, usually the chunk file stem.
    #[serde(default)]
    pub name: String,

    /// Number of pages the document spans. When absent the highest
    /// provenance page number is used instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,

    /// Top-level content items in reading order.
    #[serde(default)]
    pub items: Vec<DocItem>,
}

/// One node of the content tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocItem {
    pub label: ItemLabel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Where on the page(s) this item was found. 1-based page numbers.
    #[serde(default)]
    pub prov: Vec<ProvenanceItem>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DocItem>,
}

/// A single provenance record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceItem {
    /// Page number, 1-indexed.
    pub page_no: usize,

    /// Bounding box `[l, t, r, b]` in page points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
}

/// Content item label. Unknown labels deserialize as [`ItemLabel::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemLabel {
    Text,
    Title,
    SectionHeader,
    ListItem,
    Caption,
    Footnote,
    Formula,
    Code,
    Table,
    Picture,
    Group,
    #[serde(other)]
    Other,
}

impl ItemLabel {
    /// Whether the item carries running text.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            ItemLabel::Text
                | ItemLabel::Title
                | ItemLabel::SectionHeader
                | ItemLabel::ListItem
                | ItemLabel::Caption
                | ItemLabel::Footnote
                | ItemLabel::Formula
                | ItemLabel::Code
        )
    }
}

impl DocItem {
    /// A leaf item with a single provenance record.
    pub fn on_page(label: ItemLabel, text: impl Into<String>, page_no: usize) -> Self {
        Self {
            label,
            text: Some(text.into()),
            prov: vec![ProvenanceItem {
                page_no,
                bbox: None,
            }],
            children: Vec::new(),
        }
    }
}

impl StructuredDocument {
    /// An empty document with the default schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema_name: default_schema_name(),
            version: None,
            name: name.into(),
            page_count: None,
            items: Vec::new(),
        }
    }

    /// Depth-first, pre-order traversal yielding `(item, level)`.
    pub fn iter_items(&self) -> Items<'_> {
        Items {
            stack: self.items.iter().rev().map(|i| (i, 0)).collect(),
        }
    }

    /// Pages spanned: the declared count, else the highest provenance page.
    pub fn effective_page_count(&self) -> usize {
        self.page_count.unwrap_or_else(|| {
            self.iter_items()
                .flat_map(|(item, _)| item.prov.iter().map(|p| p.page_no))
                .max()
                .unwrap_or(0)
        })
    }

    /// Shift every provenance page number by `offset`.
    pub fn offset_pages(&mut self, offset: usize) {
        fn shift(item: &mut DocItem, offset: usize) {
            for p in &mut item.prov {
                p.page_no += offset;
            }
            for child in &mut item.children {
                shift(child, offset);
            }
        }
        for item in &mut self.items {
            shift(item, offset);
        }
    }
}

/// Iterator returned by [`StructuredDocument::iter_items`].
pub struct Items<'a> {
    stack: Vec<(&'a DocItem, usize)>,
}

impl<'a> Iterator for Items<'a> {
    type Item = (&'a DocItem, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (item, level) = self.stack.pop()?;
        self.stack
            .extend(item.children.iter().rev().map(|c| (c, level + 1)));
        Some((item, level))
    }
}

/// The narrow view merge and validation need of a converted document.
pub trait ProvenanceSource {
    /// Number of content items, at any depth.
    fn item_count(&self) -> usize;

    /// Every provenance page number, in document traversal order.
    fn provenance_pages(&self) -> Vec<usize>;
}

impl ProvenanceSource for StructuredDocument {
    fn item_count(&self) -> usize {
        self.iter_items().count()
    }

    fn provenance_pages(&self) -> Vec<usize> {
        self.iter_items()
            .flat_map(|(item, _)| item.prov.iter().map(|p| p.page_no))
            .collect()
    }
}
