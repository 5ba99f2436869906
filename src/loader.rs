//! Document loaders: local files, directories, and web pages.
//!
//! A [`DocumentLoader`] turns a source location into [`RawDocument`]s: raw
//! text plus an untyped metadata map carrying at least `source`. The
//! shipped [`FileLoader`] handles:
//!
//! | Extension | Extraction |
//! |-----------|------------|
//! | `.txt`, `.md` | UTF-8 text as-is |
//! | `.pdf` | `pdf-extract`, one document per page |
//! | `.docx` | `word/document.xml` paragraphs |
//! | `.html`, `.htm` | visible text |
//!
//! Single-file loads propagate every error. Directory scans and URL batches
//! are lenient: each failing item is logged and recorded in the returned
//! [`LoadReport`], and the rest are still loaded. Files with unsupported
//! extensions are skipped silently during scans.

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use ragline_core::models::RawDocument;
use ragline_core::{Error, Result};

use crate::embedding::http_client;
use crate::extract::{self, MIME_DOCX, MIME_HTML, MIME_PDF};

/// One item that could not be loaded during a batch.
#[derive(Debug)]
pub struct LoadError {
    pub location: String,
    pub error: Error,
}

/// Outcome of a lenient batch load.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<RawDocument>,
    pub failures: Vec<LoadError>,
}

impl LoadReport {
    fn fail(&mut self, location: impl Into<String>, error: Error) {
        let location = location.into();
        tracing::warn!(location = %location, error = %error, "skipping source that failed to load");
        self.failures.push(LoadError { location, error });
    }
}

#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load one file. Unsupported extensions and read/parse errors fail.
    async fn load_path(&self, path: &Path) -> Result<Vec<RawDocument>>;

    /// Load every supported file under `path` (top level only unless
    /// `recursive`), in file-name order.
    async fn load_directory(&self, path: &Path, recursive: bool) -> Result<LoadReport>;

    /// Fetch and extract each URL.
    async fn load_urls(&self, urls: &[String]) -> Result<LoadReport>;
}

/// Kinds of local file the [`FileLoader`] understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Text,
    Pdf,
    Docx,
    Html,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "md" => Some(SourceKind::Text),
            "pdf" => Some(SourceKind::Pdf),
            "docx" => Some(SourceKind::Docx),
            "html" | "htm" => Some(SourceKind::Html),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            SourceKind::Text => "text/plain",
            SourceKind::Pdf => MIME_PDF,
            SourceKind::Docx => MIME_DOCX,
            SourceKind::Html => MIME_HTML,
        }
    }
}

/// Filesystem and HTTP loader.
pub struct FileLoader {
    client: reqwest::Client,
    excludes: GlobSet,
}

impl FileLoader {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let default_excludes = ["**/.git/**", "**/target/**", "**/node_modules/**"];
        Ok(Self {
            client: http_client(timeout_secs)?,
            excludes: build_globset(&default_excludes)?,
        })
    }

    /// Supported, non-excluded files under `root`, sorted by name. Walk
    /// errors are recorded in `report`.
    fn scan(&self, root: &Path, recursive: bool, report: &mut LoadReport) -> Vec<PathBuf> {
        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(root).max_depth(max_depth).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let location = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    report.fail(location.clone(), Error::load_failure(location, e));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if self.excludes.is_match(relative) {
                continue;
            }
            if SourceKind::from_path(path).is_none() {
                tracing::debug!(path = %path.display(), "skipping unsupported file");
                continue;
            }
            files.push(path.to_path_buf());
        }
        files
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<RawDocument>> {
        let parsed = reqwest::Url::parse(url).map_err(|e| Error::load_failure(url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::UnsupportedSourceKind(format!(
                "{} (only http and https URLs can be fetched)",
                url
            )));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| Error::load_failure(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::load_failure(url, format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(MIME_HTML)
            .to_ascii_lowercase();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::load_failure(url, e))?;

        if content_type.contains("pdf") {
            let bytes = bytes.to_vec();
            let pages = extract_blocking(url, move || extract::extract_pdf_pages(&bytes)).await?;
            return Ok(pdf_page_documents(pages, url)
                .into_iter()
                .map(|doc| doc.insert("url", url))
                .collect());
        }

        let mut title = None;
        let text = if content_type.starts_with("text/plain") {
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            let html = String::from_utf8_lossy(&bytes);
            title = extract::html_title(&html);
            extract::html_to_text(&html)
        };

        let mut doc = RawDocument::new(text, url)
            .insert("url", url)
            .insert("content_type", content_type);
        if let Some(title) = title {
            doc = doc.insert("title", title);
        }
        Ok(vec![doc])
    }
}

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load_path(&self, path: &Path) -> Result<Vec<RawDocument>> {
        let location = path.display().to_string();
        let kind = SourceKind::from_path(path).ok_or_else(|| {
            Error::UnsupportedSourceKind(format!("{} (unknown file extension)", location))
        })?;
        if !path.is_file() {
            return Err(Error::load_failure(&location, "no such file"));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::load_failure(&location, e))?;
        let text = match kind {
            SourceKind::Text => {
                String::from_utf8(bytes).map_err(|e| Error::load_failure(&location, e))?
            }
            SourceKind::Html => extract::html_to_text(&String::from_utf8_lossy(&bytes)),
            SourceKind::Docx => {
                extract_blocking(&location, move || extract::extract_text(&bytes, MIME_DOCX))
                    .await?
            }
            SourceKind::Pdf => {
                let pages =
                    extract_blocking(&location, move || extract::extract_pdf_pages(&bytes)).await?;
                tracing::debug!(source = %location, pages = pages.len(), "loaded pdf");
                return Ok(pdf_page_documents(pages, &location));
            }
        };

        tracing::debug!(source = %location, chars = text.len(), "loaded file");
        let doc = RawDocument::new(text, location).insert("content_type", kind.content_type());
        Ok(vec![doc])
    }

    async fn load_directory(&self, path: &Path, recursive: bool) -> Result<LoadReport> {
        if !path.is_dir() {
            return Err(Error::load_failure(
                path.display().to_string(),
                "not a directory",
            ));
        }

        let mut report = LoadReport::default();
        let files = self.scan(path, recursive, &mut report);
        for file in &files {
            match self.load_path(file).await {
                Ok(docs) => report.documents.extend(docs),
                Err(e) => report.fail(file.display().to_string(), e),
            }
        }

        tracing::info!(
            directory = %path.display(),
            recursive,
            loaded = report.documents.len(),
            failed = report.failures.len(),
            "directory scan finished"
        );
        Ok(report)
    }

    async fn load_urls(&self, urls: &[String]) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        for url in urls {
            match self.fetch_url(url).await {
                Ok(docs) => report.documents.extend(docs),
                Err(e) => report.fail(url.clone(), e),
            }
        }
        tracing::info!(
            loaded = report.documents.len(),
            failed = report.failures.len(),
            "url batch finished"
        );
        Ok(report)
    }
}

/// One document per PDF page, numbered from 1 in `page`.
fn pdf_page_documents(pages: Vec<String>, location: &str) -> Vec<RawDocument> {
    pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            RawDocument::new(text, location)
                .insert("content_type", MIME_PDF)
                .insert("page", i + 1)
        })
        .collect()
}

async fn extract_blocking<T, F>(location: &str, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::result::Result<T, extract::ExtractError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| Error::load_failure(location, e))?
        .map_err(|e| Error::load_failure(location, e))
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).map_err(|e| Error::Configuration(e.to_string()))?);
    }
    builder
        .build()
        .map_err(|e| Error::Configuration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    fn metadata_text(doc: &RawDocument, key: &str) -> Option<String> {
        match doc.metadata.get(key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn loader() -> FileLoader {
        FileLoader::new(5).unwrap()
    }

    #[test]
    fn source_kind_from_extension() {
        assert_eq!(SourceKind::from_path(Path::new("a.TXT")), Some(SourceKind::Text));
        assert_eq!(SourceKind::from_path(Path::new("a.htm")), Some(SourceKind::Html));
        assert_eq!(SourceKind::from_path(Path::new("a.xlsx")), None);
        assert_eq!(SourceKind::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn pdf_pages_become_numbered_documents() {
        let pages = vec!["Intro page.".to_string(), "Second page.".to_string()];
        let docs = pdf_page_documents(pages, "manual.pdf");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].content, "Second page.");
        for (i, doc) in docs.iter().enumerate() {
            assert_eq!(doc.metadata.get("page"), Some(&Value::from(i + 1)));
            assert_eq!(metadata_text(doc, "source").as_deref(), Some("manual.pdf"));
            assert_eq!(metadata_text(doc, "content_type").as_deref(), Some(MIME_PDF));
        }
    }

    #[test]
    fn pdf_page_numbers_reach_references() {
        use ragline_core::citation::{extract_references, format_references};
        use ragline_core::enrich::DocumentProcessor;

        let pages = vec!["Alpha section text.".to_string(), "Beta section text.".to_string()];
        let chunks = DocumentProcessor::new(200, 20)
            .unwrap()
            .process_documents(&pdf_page_documents(pages, "docs/manual.pdf"));
        let references = extract_references(&chunks);
        let pages: Vec<Option<&str>> = references.iter().map(|r| r.page.as_deref()).collect();
        assert_eq!(pages, vec![Some("1"), Some("2")]);
        assert!(format_references(&references).contains("，页码：2"));
    }

    #[tokio::test]
    async fn load_path_reads_text_with_source() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("notes.txt");
        fs::write(&file, "hello world").unwrap();

        let docs = loader().load_path(&file).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "hello world");
        assert_eq!(
            metadata_text(&docs[0], "source").as_deref(),
            Some(file.display().to_string().as_str())
        );
    }

    #[tokio::test]
    async fn load_path_rejects_unknown_extension() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("data.csv");
        fs::write(&file, "a,b").unwrap();
        let err = loader().load_path(&file).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedSourceKind(_)));
    }

    #[tokio::test]
    async fn load_path_missing_file_is_load_failure() {
        let err = loader()
            .load_path(Path::new("/nonexistent/ragline/a.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LoadFailure { .. }));
    }

    #[tokio::test]
    async fn directory_scan_respects_recursion_and_skips_failures() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("a.txt"), "alpha").unwrap();
        fs::write(root.join("b.md"), "bravo").unwrap();
        fs::write(root.join("broken.pdf"), "not a pdf").unwrap();
        fs::write(root.join("image.png"), [0u8, 1, 2]).unwrap();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("nested").join("c.txt"), "charlie").unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git").join("HEAD.txt"), "ref").unwrap();

        let flat = loader().load_directory(root, false).await.unwrap();
        let contents: Vec<&str> = flat.documents.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["alpha", "bravo"]);
        assert_eq!(flat.failures.len(), 1);
        assert!(flat.failures[0].location.ends_with("broken.pdf"));

        let deep = loader().load_directory(root, true).await.unwrap();
        let contents: Vec<&str> = deep.documents.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["alpha", "bravo", "charlie"]);
    }

    #[tokio::test]
    async fn load_directory_on_file_fails() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "x").unwrap();
        assert!(loader().load_directory(&file, false).await.is_err());
    }

    #[tokio::test]
    async fn non_http_urls_are_recorded_as_failures() {
        let report = loader()
            .load_urls(&["ftp://example.com/file.txt".to_string(), "not a url".to_string()])
            .await
            .unwrap();
        assert!(report.documents.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(
            report.failures[0].error,
            Error::UnsupportedSourceKind(_)
        ));
    }

    #[tokio::test]
    async fn fetches_html_page_with_title() {
        let app = axum::Router::new().route(
            "/page",
            axum::routing::get(|| async {
                axum::response::Html(
                    "<html><head><title>Guide</title></head><body><p>Hello from the web.</p></body></html>",
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = format!("http://{}/page", addr);
        let report = loader().load_urls(&[url.clone()]).await.unwrap();
        assert!(report.failures.is_empty());
        let doc = &report.documents[0];
        assert_eq!(doc.content, "Hello from the web.");
        assert_eq!(metadata_text(doc, "source"), Some(url.clone()));
        assert_eq!(metadata_text(doc, "url"), Some(url));
        assert_eq!(metadata_text(doc, "title").as_deref(), Some("Guide"));
    }
}
