use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Book {
    pub id: i64,
    pub name: Option<String>,
    pub author_id: Option<i64>,
    pub cat_id: Option<i64>,
    pub pdf_links: Option<String>, // serialized PdfLinks
    pub info_long: Option<String>,
    pub printed: Option<String>,
    pub size: Option<f64>, // megabytes
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub death: Option<Value>,
    pub death_inexact_label: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// PDF availability as published by the catalog under `meta.pdf_links`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PdfLinks {
    pub files: Vec<String>,
    pub root: String,
}

impl PdfLinks {
    /// Reads `meta.pdf_links` from a book detail payload. Returns `None`
    /// unless the structure is present and well formed.
    pub fn from_book_payload(payload: &Value) -> Option<Self> {
        Self::from_value(payload.get("meta")?.get("pdf_links")?)
    }

    /// Checks a raw `pdf_links` object. Keys other than `files` and `root`
    /// are allowed and ignored.
    pub fn from_value(raw: &Value) -> Option<Self> {
        let links: PdfLinks = serde_json::from_value(raw.clone()).ok()?;
        links.is_well_formed().then_some(links)
    }

    /// Parses a serialized `books.pdf_links` column value.
    pub fn from_column(raw: &str) -> Option<Self> {
        let links: PdfLinks = serde_json::from_str(raw).ok()?;
        links.is_well_formed().then_some(links)
    }

    /// Both `files` and `root` must be non-empty. Entries are not inspected.
    pub fn is_well_formed(&self) -> bool {
        !self.root.is_empty() && !self.files.is_empty()
    }
}
