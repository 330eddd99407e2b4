//! Display preprocessing and Word export of generated answers.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use thiserror::Error;
use tracing::info;

use crate::session::AppMode;

/// MIME type of the exported document.
pub const EXPORT_MIME_TYPE: &str = "application/msword";

const EXPORT_TITLE: &str = "HSG Hóa Học";

const EXPORT_STYLE: &str = r#"<style>
@page Section1 { size: 21cm 29.7cm; margin: 2.0cm 2.0cm 2.0cm 3.0cm; }
div.Section1 { page: Section1; }
body { font-family: "Times New Roman", serif; font-size: 14pt; line-height: 1.5; color: #000; }
p { margin-top: 6pt; margin-bottom: 6pt; text-align: justify; }
h1, h2, h3, h4 { font-family: "Times New Roman", serif; font-weight: bold; margin-top: 12pt; margin-bottom: 6pt; }
h1 { font-size: 16pt; text-align: center; text-transform: uppercase; }
h2 { font-size: 14pt; text-transform: uppercase; }
h3 { font-size: 14pt; font-weight: bold; }
table { border-collapse: collapse; width: 100%; margin: 12pt 0; border: 1px solid windowtext; }
td, th { border: 1px solid windowtext; padding: 5pt; vertical-align: top; }
th { font-weight: bold; background-color: #E6E6E6; text-align: center; }
ul, ol { margin: 0; } li { margin-bottom: 3pt; }
strong, b { font-weight: bold; } em, i { font-style: italic; }
</style>"#;

/// Errors from exporting or copying a result.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Writing the exported file failed.
    #[error("Failed to save document: {0}")]
    Io(#[from] std::io::Error),
    /// Built without clipboard support.
    #[error("Clipboard support is not enabled in this build")]
    ClipboardUnavailable,
    /// The system clipboard refused the text.
    #[error("Clipboard error: {0}")]
    Clipboard(String),
}

fn notation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\\xrightarrow\{[^}]*\}|\\(?:rightarrow|leftarrow|Delta|degree|alpha|beta|gamma|uparrow|downarrow)|→",
        )
        .expect("notation pattern is valid")
    })
}

fn rewrite_prose(prose: &str, out: &mut String) {
    let mut last = 0;
    for m in notation_pattern().find_iter(prose) {
        out.push_str(&prose[last..m.start()]);
        let token = m.as_str();
        if token == "→" {
            out.push_str(r"$\rightarrow$");
        } else if prose[..m.start()].ends_with('$') || prose[m.end()..].starts_with('$') {
            out.push_str(token);
        } else {
            out.push_str(" $");
            out.push_str(token);
            out.push_str("$ ");
        }
        last = m.end();
    }
    out.push_str(&prose[last..]);
}

fn find_unescaped_dollar(text: &str) -> Option<usize> {
    text.match_indices('$')
        .map(|(i, _)| i)
        .find(|&i| !text[..i].ends_with('\\'))
}

/// Wraps bare LaTeX chemistry notation in `$…$` so a math renderer picks it up.
///
/// Existing `$…$` and `$$…$$` spans are copied through untouched.
pub fn preprocess_chemistry(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;

    while let Some(open) = find_unescaped_dollar(rest) {
        let delimiter = if rest[open..].starts_with("$$") { "$$" } else { "$" };
        let body = open + delimiter.len();
        let Some(close) = rest[body..].find(delimiter) else {
            break;
        };
        let end = body + close + delimiter.len();
        rewrite_prose(&rest[..open], &mut out);
        out.push_str(&rest[open..end]);
        rest = &rest[end..];
    }

    rewrite_prose(rest, &mut out);
    out
}

/// A generated document ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    /// Suggested file name
    pub file_name: String,
    /// MIME type of `bytes`
    pub mime_type: String,
    /// File contents
    pub bytes: Vec<u8>,
}

/// Renders markdown into a Word-compatible HTML document.
pub fn export_document(markdown: &str, mode: AppMode, date: NaiveDate) -> ExportedDocument {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut body = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut body, Parser::new_ext(markdown, options));

    let document = format!(
        "\u{feff}<html xmlns:o='urn:schemas-microsoft-com:office:office' \
         xmlns:w='urn:schemas-microsoft-com:office:word' \
         xmlns='http://www.w3.org/TR/REC-html40'>\n\
         <head><meta charset='utf-8'><title>{EXPORT_TITLE}</title>\n{EXPORT_STYLE}\n</head>\n\
         <body><div class=\"Section1\">\n{body}</div></body></html>\n"
    );

    ExportedDocument {
        file_name: format!(
            "{}_HoaHoc_{}.doc",
            mode.export_prefix(),
            date.format("%Y-%m-%d")
        ),
        mime_type: EXPORT_MIME_TYPE.to_string(),
        bytes: document.into_bytes(),
    }
}

/// The user's download directory, or the working directory.
pub fn default_export_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Writes `document` into `dir`, returning the full path.
pub async fn save_document(document: &ExportedDocument, dir: impl AsRef<Path>) -> Result<PathBuf, RenderError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(&document.file_name);
    tokio::fs::write(&path, &document.bytes).await?;
    info!(path = %path.display(), bytes = document.bytes.len(), "document exported");
    Ok(path)
}

/// Places the raw result text on the system clipboard.
#[cfg(feature = "clipboard")]
pub fn copy_to_clipboard(text: &str) -> Result<(), RenderError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| RenderError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(text.to_owned())
        .map_err(|e| RenderError::Clipboard(e.to_string()))
}

/// Places the raw result text on the system clipboard.
#[cfg(not(feature = "clipboard"))]
pub fn copy_to_clipboard(_text: &str) -> Result<(), RenderError> {
    Err(RenderError::ClipboardUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_bare_arrow_commands() {
        assert_eq!(
            preprocess_chemistry(r"Fe \rightarrow Fe^{2+}"),
            r"Fe  $\rightarrow$  Fe^{2+}"
        );
        assert_eq!(
            preprocess_chemistry(r"A \xrightarrow{t^o} B"),
            r"A  $\xrightarrow{t^o}$  B"
        );
        assert_eq!(preprocess_chemistry(r"\Delta H < 0"), r" $\Delta$  H < 0");
    }

    #[test]
    fn unicode_arrow_becomes_math() {
        assert_eq!(preprocess_chemistry("A → B"), r"A $\rightarrow$ B");
    }

    #[test]
    fn existing_math_is_untouched() {
        let inline = r"Ta có $Fe \rightarrow Fe^{2+}$ và $\Delta H$.";
        assert_eq!(preprocess_chemistry(inline), inline);
        let display = r"$$2H_2 + O_2 \xrightarrow{t^o} 2H_2O$$";
        assert_eq!(preprocess_chemistry(display), display);
    }

    #[test]
    fn prose_around_math_is_still_processed() {
        assert_eq!(
            preprocess_chemistry(r"$x$ rồi \uparrow"),
            r"$x$ rồi  $\uparrow$ "
        );
    }

    #[test]
    fn adjacent_dollar_blocks_wrapping() {
        assert_eq!(preprocess_chemistry(r"giá \alpha$"), r"giá \alpha$");
    }

    #[test]
    fn plain_text_passes_through() {
        let text = "Cân bằng phương trình: 2H2 + O2 = 2H2O";
        assert_eq!(preprocess_chemistry(text), text);
    }

    #[test]
    fn export_names_and_styles_document() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let doc = export_document(
            "# Đề thi\n\n| Câu | Điểm |\n|---|---|\n| 1 | 2 |\n",
            AppMode::ExamCreator,
            date,
        );
        assert_eq!(doc.file_name, "DeThi_HSG_HoaHoc_2025-03-09.doc");
        assert_eq!(doc.mime_type, EXPORT_MIME_TYPE);
        assert!(doc.bytes.starts_with("\u{feff}".as_bytes()));

        let html = String::from_utf8(doc.bytes).unwrap();
        assert!(html.contains("<table>"));
        assert!(html.contains("<h1>Đề thi</h1>"));
        assert!(html.contains("size: 21cm 29.7cm"));
        assert!(html.contains("Times New Roman"));
        assert!(html.contains("#E6E6E6"));
    }

    #[test]
    fn export_prefix_follows_mode() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(export_document("x", AppMode::Solver, date)
            .file_name
            .starts_with("GiaiBai_"));
        assert!(export_document("x", AppMode::Grader, date)
            .file_name
            .starts_with("ChamBai_"));
    }

    #[tokio::test]
    async fn save_writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let doc = export_document("**x**", AppMode::Solver, date);
        let path = save_document(&doc, dir.path().join("out")).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), doc.bytes);
    }

    #[cfg(not(feature = "clipboard"))]
    #[test]
    fn clipboard_requires_feature() {
        assert!(matches!(
            copy_to_clipboard("x"),
            Err(RenderError::ClipboardUnavailable)
        ));
    }
}
