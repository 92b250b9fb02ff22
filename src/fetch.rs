//! C5: the pluggable fetch backend.
//!
//! [`FetchBackend`] is the seam the spec calls out for swapping in a
//! browser-driven backend later; [`ReqwestFetchBackend`] is the only
//! implementation shipped here.

use async_trait::async_trait;

use crate::error::FetchError;

/// What a fetch produced, already classified by content type.
#[derive(Debug, Clone)]
pub enum FetchBody {
    Html(String),
    Binary(Vec<u8>),
}

/// Outcome of fetching one URL: either a body with its final (post-redirect)
/// URL and status code, or a redirect the caller must follow itself, or a
/// transport failure.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub final_url: String,
    pub status: u16,
    pub body: FetchBody,
    pub content_type: Option<String>,
}

/// Abstraction over "turn a URL into bytes". The default implementation is a
/// plain HTTP client; a future browser-rendering backend (out of scope here)
/// would implement the same trait.
#[async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError>;
}

/// Default backend: a plain `reqwest` GET, with binary vs. HTML
/// classification by sniffing the response bytes through `infer` and
/// `mime`.
pub struct ReqwestFetchBackend {
    client: reqwest::Client,
}

impl ReqwestFetchBackend {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchBackend for ReqwestFetchBackend {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;

        let body = if is_binary_content(content_type.as_deref(), &bytes) {
            FetchBody::Binary(bytes.to_vec())
        } else {
            match String::from_utf8(bytes.to_vec()) {
                Ok(text) => FetchBody::Html(text),
                Err(_) => FetchBody::Binary(bytes.to_vec()),
            }
        };

        Ok(FetchOutcome {
            final_url,
            status,
            body,
            content_type,
        })
    }
}

/// True iff the response looks like a non-HTML binary document, by
/// `Content-Type` header first and a magic-byte sniff as a fallback for
/// servers that mislabel or omit it.
fn is_binary_content(content_type: Option<&str>, bytes: &[u8]) -> bool {
    if let Some(ct) = content_type {
        if let Ok(mime) = ct.parse::<mime::Mime>() {
            if mime.type_() == mime::TEXT {
                return false;
            }
            if mime.subtype() == mime::HTML || mime.type_() == mime::APPLICATION && mime.subtype() == "xhtml+xml" {
                return false;
            }
        }
    }

    infer::get(bytes).is_some_and(|kind| kind.mime_type() != "text/html")
}

/// Exact MIME strings the reference deployment checks for when persisting
/// `page_data` rows, so the store can record the right [`crate::model::DataType`]
/// even when the URL extension is absent or unreliable.
pub fn mime_to_data_type(mime_type: &str) -> Option<crate::model::DataType> {
    match mime_type {
        "application/pdf" => Some(crate::model::DataType::Pdf),
        "application/msword" => Some(crate::model::DataType::Doc),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            Some(crate::model::DataType::Docx)
        }
        "application/vnd.ms-powerpoint" => Some(crate::model::DataType::Ppt),
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
            Some(crate::model::DataType::Pptx)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_html_content_type_is_not_binary() {
        assert!(!is_binary_content(Some("text/html; charset=utf-8"), b"<html></html>"));
    }

    #[test]
    fn pdf_magic_bytes_are_binary() {
        assert!(is_binary_content(None, b"%PDF-1.4 rest of file"));
    }

    #[test]
    fn mime_mapping_covers_office_documents() {
        assert_eq!(mime_to_data_type("application/pdf"), Some(crate::model::DataType::Pdf));
        assert_eq!(
            mime_to_data_type(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            Some(crate::model::DataType::Docx)
        );
        assert_eq!(mime_to_data_type("image/png"), None);
    }
}
