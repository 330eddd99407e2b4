//! Reading uploaded problem and submission files.
//!
//! PDFs are passed through to the model as inline attachments; DOCX and TXT
//! files are reduced to plain text locally.

use std::io;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::ContentPart;

/// Largest accepted upload, in bytes.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const PDF_MIME: &str = "application/pdf";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const TEXT_MIME: &str = "text/plain";

/// Represents possible errors that can occur while reading an upload.
#[derive(Error, Debug)]
pub enum FileError {
    /// The file exceeds [`MAX_FILE_SIZE`].
    #[error("File quá lớn (tối đa 10MB): {0} bytes")]
    TooLarge(u64),
    /// The file type is not PDF, DOCX or TXT.
    #[error("Định dạng file không được hỗ trợ: {0}")]
    Unsupported(String),
    /// The file could be read but no usable content came out of it.
    #[error("Không thể đọc nội dung file {0}")]
    Unreadable(String),
    /// Failed to read the file from disk.
    #[error("Lỗi đọc file: {0}")]
    Io(#[from] io::Error),
}

/// Kind of an accepted upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A PDF document, kept as binary
    Pdf,
    /// A Word document, reduced to text
    Docx,
    /// A plain text file
    Txt,
}

/// Content of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Extracted or decoded text
    Text(String),
    /// Raw bytes passed through as an attachment
    Binary(Vec<u8>),
}

/// An upload ready to be attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Original file name
    pub name: String,
    /// Detected kind
    pub kind: FileKind,
    /// MIME type of `content` (`text/plain` once text has been extracted)
    pub mime_type: String,
    /// The content itself
    pub content: FileContent,
}

impl UploadedFile {
    /// Builds request parts for this file followed by `prompt`.
    ///
    /// Binary files become an attachment part plus the prompt; text files are
    /// quoted inline ahead of the prompt under `heading`.
    pub fn into_parts(self, heading: &str, prompt: &str) -> Vec<ContentPart> {
        match self.content {
            FileContent::Binary(data) => vec![
                ContentPart::binary(self.mime_type, data),
                ContentPart::text(prompt),
            ],
            FileContent::Text(text) => vec![ContentPart::text(format!(
                "{heading}:\n\"\"\"\n{text}\n\"\"\"\n\n{prompt}"
            ))],
        }
    }
}

/// An image pasted from the clipboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastedImage {
    /// MIME type reported by the clipboard, e.g. `image/png`
    pub mime_type: String,
    /// Raw image bytes
    pub data: Vec<u8>,
}

impl PastedImage {
    /// Accepts an image up to [`MAX_FILE_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Unsupported`] for non-image MIME types and
    /// [`FileError::TooLarge`] for oversize data.
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Result<Self, FileError> {
        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(FileError::Unsupported(mime_type));
        }
        check_size(data.len() as u64)?;
        Ok(Self { mime_type, data })
    }

    /// Reads an image file, guessing its MIME type from the extension.
    ///
    /// # Errors
    ///
    /// See [`PastedImage::new`]; also fails on I/O errors.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        check_size(tokio::fs::metadata(path).await?.len())?;
        let mime_type = mime_guess::from_path(path).first_or_octet_stream();
        Self::new(mime_type.essence_str(), tokio::fs::read(path).await?)
    }

    /// The image as a request part.
    pub fn to_part(&self) -> ContentPart {
        ContentPart::binary(self.mime_type.clone(), self.data.clone())
    }
}

fn check_size(len: u64) -> Result<(), FileError> {
    if len > MAX_FILE_SIZE {
        Err(FileError::TooLarge(len))
    } else {
        Ok(())
    }
}

/// Detects the kind of a file from its name.
///
/// # Errors
///
/// Returns [`FileError::Unsupported`] for anything but PDF, DOCX and TXT.
pub fn detect_kind(name: &str) -> Result<FileKind, FileError> {
    let mime = mime_guess::from_path(name.to_lowercase()).first_or_octet_stream();
    match mime.essence_str() {
        PDF_MIME => Ok(FileKind::Pdf),
        DOCX_MIME => Ok(FileKind::Docx),
        TEXT_MIME => Ok(FileKind::Txt),
        other => Err(FileError::Unsupported(format!("{name} ({other})"))),
    }
}

/// Turns raw upload bytes into an [`UploadedFile`].
///
/// # Errors
///
/// Returns [`FileError`] when the file is too large, of an unsupported type,
/// or has no readable content.
pub fn ingest_bytes(name: &str, bytes: Vec<u8>) -> Result<UploadedFile, FileError> {
    check_size(bytes.len() as u64)?;
    let kind = detect_kind(name)?;
    debug!(name, ?kind, size = bytes.len(), "ingesting upload");

    let (mime_type, content) = match kind {
        FileKind::Pdf => (PDF_MIME, FileContent::Binary(bytes)),
        FileKind::Docx => (TEXT_MIME, FileContent::Text(docx_text(name, &bytes)?)),
        FileKind::Txt => (
            TEXT_MIME,
            FileContent::Text(String::from_utf8_lossy(&bytes).into_owned()),
        ),
    };

    Ok(UploadedFile {
        name: name.to_string(),
        kind,
        mime_type: mime_type.to_string(),
        content,
    })
}

/// Reads and ingests a file from disk.
///
/// # Errors
///
/// See [`ingest_bytes`]; the size ceiling is checked before reading.
pub async fn ingest_file(path: impl AsRef<Path>) -> Result<UploadedFile, FileError> {
    let path = path.as_ref();
    check_size(tokio::fs::metadata(path).await?.len())?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let bytes = tokio::fs::read(path).await?;
    ingest_bytes(&name, bytes)
}

/// Like [`ingest_file`], but a failure just means "no file": it is logged
/// and `None` is returned.
pub async fn ingest_or_none(path: impl AsRef<Path>) -> Option<UploadedFile> {
    let path = path.as_ref();
    match ingest_file(path).await {
        Ok(file) => Some(file),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "upload rejected");
            None
        }
    }
}

fn docx_text(name: &str, bytes: &[u8]) -> Result<String, FileError> {
    if bytes.starts_with(b"PK") {
        return match extract_docx(bytes) {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => Err(FileError::Unreadable(name.to_string())),
            Err(e) => {
                // A broken zip never falls back to lossy text; only its size is logged.
                let lossy = strip_markup(&String::from_utf8_lossy(bytes));
                debug!(
                    name,
                    error = %e,
                    lossy_chars = lossy.chars().count(),
                    "docx parse failed, skipping lossy text fallback"
                );
                Err(FileError::Unreadable(name.to_string()))
            }
        };
    }

    // Not a zip container: Word-saved HTML renamed to .docx.
    let text = strip_markup(&String::from_utf8_lossy(bytes));
    if text.is_empty() {
        Err(FileError::Unreadable(name.to_string()))
    } else {
        Ok(text)
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, docx_rs::ReaderError> {
    use docx_rs::{DocumentChild, ParagraphChild, RunChild};

    let docx = docx_rs::read_docx(bytes)?;
    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(
                para.children
                    .iter()
                    .filter_map(|pc| match pc {
                        ParagraphChild::Run(run) => Some(
                            run.children
                                .iter()
                                .filter_map(|rc| match rc {
                                    RunChild::Text(t) => Some(t.text.as_str()),
                                    _ => None,
                                })
                                .collect::<String>(),
                        ),
                        _ => None,
                    })
                    .collect::<String>(),
            ),
            _ => None,
        })
        .filter(|text| !text.is_empty())
        .collect();

    Ok(paragraphs.join("\n"))
}

fn markup_patterns() -> &'static [(Regex, &'static str); 4] {
    static PATTERNS: OnceLock<[(Regex, &'static str); 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("static pattern");
        [
            (re(r"(?is)<style[^>]*>.*?</style>"), ""),
            (re(r"(?is)<script[^>]*>.*?</script>"), ""),
            (re(r"<[^>]+>"), "\n"),
            (re(r"\n\s*\n"), "\n\n"),
        ]
    })
}

fn strip_markup(raw: &str) -> String {
    let [style, script, tags, blank_lines] = markup_patterns();
    let text = style.0.replace_all(raw, style.1);
    let text = script.0.replace_all(&text, script.1);
    let text = tags.0.replace_all(&text, tags.1);
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    blank_lines
        .0
        .replace_all(&text, blank_lines.1)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_supported_kinds() {
        assert_eq!(detect_kind("de_thi.PDF").unwrap(), FileKind::Pdf);
        assert_eq!(detect_kind("bai_lam.docx").unwrap(), FileKind::Docx);
        assert_eq!(detect_kind("notes.txt").unwrap(), FileKind::Txt);
        assert!(matches!(
            detect_kind("photo.zip"),
            Err(FileError::Unsupported(_))
        ));
    }

    #[test]
    fn pdf_stays_binary() {
        let file = ingest_bytes("de.pdf", b"%PDF-1.7 ...".to_vec()).unwrap();
        assert_eq!(file.kind, FileKind::Pdf);
        assert_eq!(file.mime_type, "application/pdf");
        let parts = file.into_parts("ĐỀ BÀI", "Giải chi tiết");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].mime_type(), Some("application/pdf"));
        assert_eq!(parts[1], ContentPart::text("Giải chi tiết"));
    }

    #[test]
    fn text_file_is_quoted_before_prompt() {
        let file = ingest_bytes("de.txt", "Câu 1: Cân bằng Fe + Cl₂".as_bytes().to_vec()).unwrap();
        let parts = file.into_parts("ĐỀ BÀI TỪ FILE", "Giải chi tiết");
        assert_eq!(
            parts,
            vec![ContentPart::text(
                "ĐỀ BÀI TỪ FILE:\n\"\"\"\nCâu 1: Cân bằng Fe + Cl₂\n\"\"\"\n\nGiải chi tiết"
            )]
        );
    }

    #[test]
    fn oversize_upload_is_rejected() {
        let bytes = vec![b'a'; (MAX_FILE_SIZE + 1) as usize];
        assert!(matches!(
            ingest_bytes("big.txt", bytes),
            Err(FileError::TooLarge(_))
        ));
    }

    #[test]
    fn html_docx_falls_back_to_stripped_text() {
        let html = "<html><style>p{}</style><body><p>Câu 1:&nbsp;Na + H&lt;sub&gt;2&lt;/sub&gt;O</p><p>Câu 2</p></body></html>";
        let file = ingest_bytes("word.docx", html.as_bytes().to_vec()).unwrap();
        let FileContent::Text(text) = file.content else {
            panic!("expected text");
        };
        assert!(text.starts_with("Câu 1: Na + H<sub>2</sub>O"));
        assert!(text.contains("Câu 2"));
        assert!(!text.contains("p{}"));
    }

    #[test]
    fn empty_docx_is_unreadable() {
        assert!(matches!(
            ingest_bytes("blank.docx", b"<p> </p>".to_vec()),
            Err(FileError::Unreadable(_))
        ));
    }

    #[test]
    fn corrupt_zip_docx_is_unreadable_even_with_text() {
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.extend_from_slice("<p>Câu 1: Cân bằng phản ứng</p>".as_bytes());
        assert!(matches!(
            ingest_bytes("hong.docx", bytes),
            Err(FileError::Unreadable(name)) if name == "hong.docx"
        ));
    }

    #[test]
    fn real_docx_text_is_extracted() {
        use docx_rs::{Docx, Paragraph, Run};

        let mut buf = io::Cursor::new(Vec::new());
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Câu 1: Tính nồng độ mol")))
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Câu 2: Điện phân NaCl")))
            .build()
            .pack(&mut buf)
            .unwrap();

        let file = ingest_bytes("de.docx", buf.into_inner()).unwrap();
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(
            file.content,
            FileContent::Text("Câu 1: Tính nồng độ mol\nCâu 2: Điện phân NaCl".into())
        );
    }

    #[test]
    fn pasted_image_requires_image_mime() {
        assert!(PastedImage::new("image/png", vec![1, 2, 3]).is_ok());
        assert!(matches!(
            PastedImage::new("text/html", vec![1]),
            Err(FileError::Unsupported(_))
        ));
    }
}
