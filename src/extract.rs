//! Text extraction for binary and markup documents (PDF, DOCX, HTML).
//!
//! Loaders supply bytes and a content type; this module returns plain UTF-8
//! text. Extraction never panics: malformed input is an [`ExtractError`],
//! which the loader reports as a load failure for that file.

use regex::Regex;
use std::io::Read;
use std::sync::OnceLock;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_HTML: &str = "text/html";

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

/// Extracts plain text from `bytes` of the given content type.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_DOCX => extract_docx(bytes),
        MIME_HTML => Ok(html_to_text(&String::from_utf8_lossy(bytes))),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    Ok(extract_pdf_pages(bytes)?.join("\n\n"))
}

/// Text of each PDF page, in page order.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    extract_paragraphs(&doc_xml)
}

/// Collect `<w:t>` runs, one line per `<w:p>` paragraph.
fn extract_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let line = current.trim();
                    if !line.is_empty() {
                        paragraphs.push(line.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.trim().is_empty() {
        paragraphs.push(current.trim().to_string());
    }
    Ok(paragraphs.join("\n\n"))
}

fn html_patterns() -> &'static [Regex; 4] {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?is)<(script|style|noscript|head)\b.*?</(script|style|noscript|head)\s*>")
                .expect("valid regex"),
            Regex::new(r"(?s)<!--.*?-->").expect("valid regex"),
            Regex::new(r"(?i)<(br|/p|/div|/h[1-6]|/li|/tr|/section|/article|/blockquote)\b[^>]*>")
                .expect("valid regex"),
            Regex::new(r"(?s)<[^>]*>").expect("valid regex"),
        ]
    })
}

/// Visible text of an HTML page.
///
/// Script, style, and head content is dropped; block-level closing tags
/// become line breaks; remaining tags are removed and common entities
/// decoded.
pub fn html_to_text(html: &str) -> String {
    let [hidden, comments, blocks, tags] = html_patterns();
    let text = hidden.replace_all(html, " ");
    let text = comments.replace_all(&text, " ");
    let text = blocks.replace_all(&text, "\n");
    let text = tags.replace_all(&text, "");
    let text = decode_entities(&text);

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Contents of the page's `<title>`, if any.
pub fn html_title(html: &str) -> Option<String> {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    let re = TITLE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("valid regex"));
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str()).trim().to_string())
        .filter(|t| !t.is_empty())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
