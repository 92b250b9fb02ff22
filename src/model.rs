//! Row types and the reference-table enums backing the `page_type`/`data_type`
//! discriminator columns.

use chrono::{DateTime, Utc};

/// State of a `page` row. Persisted as the short string in `page_type.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Frontier,
    Crawling,
    Html,
    Binary,
    Duplicate,
    Failed,
}

impl PageType {
    pub fn as_code(self) -> &'static str {
        match self {
            PageType::Frontier => "FRONTIER",
            PageType::Crawling => "CRAWLING",
            PageType::Html => "HTML",
            PageType::Binary => "BINARY",
            PageType::Duplicate => "DUPLICATE",
            PageType::Failed => "FAILED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "FRONTIER" => Some(PageType::Frontier),
            "CRAWLING" => Some(PageType::Crawling),
            "HTML" => Some(PageType::Html),
            "BINARY" => Some(PageType::Binary),
            "DUPLICATE" => Some(PageType::Duplicate),
            "FAILED" => Some(PageType::Failed),
            _ => None,
        }
    }
}

/// A downloadable binary document kind. Persisted as `data_type.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Pdf,
    Doc,
    Docx,
    Ppt,
    Pptx,
}

impl DataType {
    pub fn as_code(self) -> &'static str {
        match self {
            DataType::Pdf => "PDF",
            DataType::Doc => "DOC",
            DataType::Docx => "DOCX",
            DataType::Ppt => "PPT",
            DataType::Pptx => "PPTX",
        }
    }

    /// Classifies a lowercased file extension (without the leading dot) into
    /// a recorded `PageData` kind. `.zip` is a recognized binary link
    /// extension (see [`crate::url_normalizer::is_binary_link`]) but has no
    /// `DataType` variant, so it returns `None` here and is never recorded as
    /// `PageData`, matching the reference schema's `data_type` set.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(DataType::Pdf),
            "doc" => Some(DataType::Doc),
            "docx" => Some(DataType::Docx),
            "ppt" => Some(DataType::Ppt),
            "pptx" => Some(DataType::Pptx),
            _ => None,
        }
    }
}

/// A `site` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Site {
    pub id: i64,
    pub domain: String,
    pub robots_content: Option<String>,
    pub sitemap_content: Option<String>,
}

/// A `page` row as read back from the store.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: i64,
    pub site_id: Option<i64>,
    pub page_type: PageType,
    pub url: String,
    pub html_content: Option<String>,
    pub http_status_code: Option<i32>,
    pub html_content_hash: Option<String>,
    pub accessed_time: Option<DateTime<Utc>>,
}

/// An image discovered on an HTML page, ready to be attached to its final
/// `page_id` once the page has been persisted (see §4.9 redirect handling).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRecord {
    pub filename: Option<String>,
    pub content_type: Option<String>,
}
