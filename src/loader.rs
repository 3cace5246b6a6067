//! Content loader capability.
//!
//! The index builder depends on a [`ContentLoader`] trait rather than on any
//! particular extraction library; the two shipped implementations cover the
//! two content domains (a PDF on disk, a web page over HTTP). Extraction
//! internals are deliberately thin; this system treats them as external
//! collaborators.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Extraction failure (no panic; the index builder leaves the domain unset).
#[derive(Debug)]
pub enum LoadError {
    Pdf(String),
    Fetch(String),
    Empty(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            LoadError::Fetch(e) => write!(f, "page fetch failed: {}", e),
            LoadError::Empty(src) => write!(f, "no text extracted from {}", src),
        }
    }
}

impl std::error::Error for LoadError {}

/// A source of raw document text for one content domain.
#[async_trait]
pub trait ContentLoader: Send + Sync {
    /// Human-readable source descriptor for logs and errors.
    fn describe(&self) -> String;

    /// Extract the full plain text of the source.
    async fn load(&self) -> Result<String, LoadError>;
}

/// Loads and extracts text from a PDF file on disk.
pub struct PdfLoader {
    path: PathBuf,
}

impl PdfLoader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ContentLoader for PdfLoader {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<String, LoadError> {
        let path = self.path.clone();
        // pdf-extract is synchronous and can chew CPU on large files.
        let text = tokio::task::spawn_blocking(move || {
            let bytes = std::fs::read(&path).map_err(|e| LoadError::Pdf(e.to_string()))?;
            pdf_extract::extract_text_from_mem(&bytes).map_err(|e| LoadError::Pdf(e.to_string()))
        })
        .await
        .map_err(|e| LoadError::Pdf(e.to_string()))??;

        if text.trim().is_empty() {
            return Err(LoadError::Empty(self.describe()));
        }
        Ok(text)
    }
}

/// Fetches a web page and strips it down to visible text.
pub struct WebPageLoader {
    url: String,
    timeout: Duration,
}

impl WebPageLoader {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self { url, timeout }
    }
}

#[async_trait]
impl ContentLoader for WebPageLoader {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn load(&self) -> Result<String, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LoadError::Fetch(e.to_string()))?;

        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LoadError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Fetch(format!("{}: HTTP {}", self.url, status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| LoadError::Fetch(e.to_string()))?;

        let text = strip_html(&html);
        if text.trim().is_empty() {
            return Err(LoadError::Empty(self.describe()));
        }
        Ok(text)
    }
}

/// Reduce an HTML document to its visible text: parses the document, walks
/// the node tree skipping script/style/noscript subtrees, and collapses
/// whitespace runs to single spaces.
pub fn strip_html(html: &str) -> String {
    use ego_tree::iter::Edge;

    let document = scraper::Html::parse_document(html);
    let mut text_chunks: Vec<&str> = Vec::new();
    let mut skip_depth = 0usize;

    for edge in document.root_element().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                scraper::Node::Element(el) => {
                    if matches!(el.name(), "script" | "style" | "noscript") {
                        skip_depth += 1;
                    }
                }
                scraper::Node::Text(text) => {
                    if skip_depth == 0 {
                        text_chunks.push(text);
                    }
                }
                _ => {}
            },
            Edge::Close(node) => {
                if let scraper::Node::Element(el) = node.value() {
                    if matches!(el.name(), "script" | "style" | "noscript") && skip_depth > 0 {
                        skip_depth -= 1;
                    }
                }
            }
        }
    }

    text_chunks
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_drops_tags_and_collapses_whitespace() {
        let html = "<html><body><h1>Diet</h1>\n\n<p>Eat   <b>well</b>.</p></body></html>";
        assert_eq!(strip_html(html), "Diet Eat well .");
    }

    #[test]
    fn strip_html_skips_script_and_style_bodies() {
        let html = "<p>keep</p><script>var x = 'drop';</script><style>p{}</style><p>also</p>";
        assert_eq!(strip_html(html), "keep also");
    }

    #[test]
    fn strip_html_survives_angle_brackets_inside_scripts() {
        // Inline comparisons are everywhere on real pages; text after the
        // script must not be lost.
        let html = "<p>keep</p><script>if (a<b) x();</script><p>after</p>";
        assert_eq!(strip_html(html), "keep after");
    }

    #[test]
    fn strip_html_plain_text_passes_through() {
        assert_eq!(strip_html("no markup here"), "no markup here");
    }

    #[tokio::test]
    async fn pdf_loader_reports_missing_file() {
        let loader = PdfLoader::new(PathBuf::from("/nonexistent/file.pdf"));
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, LoadError::Pdf(_)));
    }
}
