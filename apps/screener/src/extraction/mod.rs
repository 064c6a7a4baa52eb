//! Text extraction with ordered fallbacks.
//!
//! Each attachment is classified, then run through a per-format list of
//! strategies. The first strategy whose output clears [`MIN_TEXT_CHARS`]
//! wins; a stage that errors is recorded and the next one runs. When nothing
//! clears the bar the longest non-empty result is kept.

pub mod contact;
mod docx;
mod format;
mod legacy;
mod ocr;
mod pdf;

use std::ffi::OsStr;
use std::process::Command;

use bytes::Bytes;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audit::ErrorRecorder;
use crate::models::resume::clean_string;

pub use format::DocumentFormat;

/// Non-whitespace characters a stage must produce to end the chain.
pub const MIN_TEXT_CHARS: usize = 50;

const LINKS_HEADER: &str = "Detected Hyperlinks:";
const MAX_TOOL_STDERR: usize = 300;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF parse error: {0}")]
    Pdf(String),

    #[error("DOCX parse error: {0}")]
    Docx(String),

    #[error("content is not text")]
    Binary,

    #[error("{tool} failed ({status}): {stderr}")]
    Tool {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub ocr_enabled: bool,
    pub pdftoppm_bin: String,
    pub tesseract_bin: String,
    pub legacy_doc_bin: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            pdftoppm_bin: "pdftoppm".to_string(),
            tesseract_bin: "tesseract".to_string(),
            legacy_doc_bin: "antiword".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    PdfText,
    PdfOcr,
    DocxText,
    LegacyDoc,
    PlainText,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::PdfText => "pdf_text",
            Strategy::PdfOcr => "pdf_ocr",
            Strategy::DocxText => "docx_text",
            Strategy::LegacyDoc => "legacy_doc",
            Strategy::PlainText => "plain_text",
        }
    }

    /// Ordered cheapest-first.
    pub fn plan(format: DocumentFormat) -> &'static [Strategy] {
        match format {
            DocumentFormat::Pdf => &[Strategy::PdfText, Strategy::PdfOcr],
            DocumentFormat::Docx => &[Strategy::DocxText],
            DocumentFormat::LegacyDoc => &[Strategy::LegacyDoc, Strategy::PlainText],
            DocumentFormat::Text | DocumentFormat::Unknown => &[Strategy::PlainText],
        }
    }
}

#[derive(Debug)]
pub struct StageFailure {
    pub strategy: Strategy,
    pub error: ExtractError,
}

#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub text: String,
    pub strategy: Option<Strategy>,
    pub failures: Vec<StageFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct TextExtractor {
    config: ExtractionConfig,
}

impl TextExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Runs the fallback chain synchronously. CPU-bound and may spawn
    /// subprocesses, so async callers go through [`TextExtractor::extract`].
    pub fn extract_report(&self, filename: &str, bytes: &[u8]) -> ExtractionReport {
        let format = DocumentFormat::classify(filename, bytes);
        debug!("{filename}: classified as {format:?}");

        let mut report = ExtractionReport::default();
        for &strategy in Strategy::plan(format) {
            if strategy == Strategy::PdfOcr && !self.config.ocr_enabled {
                debug!("{filename}: OCR disabled, skipping");
                continue;
            }

            let text = match self.run(strategy, bytes) {
                Ok(text) => clean_string(&text),
                Err(error) => {
                    warn!("{filename}: {} failed: {error}", strategy.name());
                    report.failures.push(StageFailure { strategy, error });
                    continue;
                }
            };

            let chars = significant_chars(&text);
            if chars >= MIN_TEXT_CHARS {
                info!("{filename}: {} produced {chars} chars", strategy.name());
                report.text = text;
                report.strategy = Some(strategy);
                return report;
            }

            debug!("{filename}: {} produced only {chars} chars", strategy.name());
            if chars > significant_chars(&report.text) {
                report.text = text;
                report.strategy = Some(strategy);
            }
        }
        report
    }

    /// Off-thread extraction. Stage errors go to the error log; the result is
    /// `""` when every stage came up empty.
    pub async fn extract(&self, filename: &str, content: Bytes, errors: &ErrorRecorder) -> String {
        let extractor = self.clone();
        let name = filename.to_string();
        let joined =
            tokio::task::spawn_blocking(move || extractor.extract_report(&name, &content)).await;

        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                errors
                    .record(
                        "extract",
                        "Extraction worker aborted",
                        &e.to_string(),
                        json!({ "filename": filename }),
                        None,
                    )
                    .await;
                return String::new();
            }
        };

        for failure in &report.failures {
            errors
                .record(
                    &format!("extract:{}", failure.strategy.name()),
                    &failure.error.to_string(),
                    "",
                    json!({ "filename": filename }),
                    None,
                )
                .await;
        }

        if report.text.is_empty() {
            errors
                .record(
                    "extract",
                    "No text extracted",
                    "",
                    json!({ "filename": filename }),
                    None,
                )
                .await;
        }
        report.text
    }

    fn run(&self, strategy: Strategy, bytes: &[u8]) -> Result<String, ExtractError> {
        match strategy {
            Strategy::PdfText => {
                let body = pdf::extract_text(bytes)?;
                if significant_chars(&body) < MIN_TEXT_CHARS {
                    // Links alone must not mask an image-only PDF.
                    return Ok(body);
                }
                Ok(append_links(body, &pdf::profile_links(bytes)))
            }
            Strategy::PdfOcr => {
                let body = ocr::ocr_pdf(bytes, &self.config)?;
                Ok(append_links(body, &pdf::profile_links(bytes)))
            }
            Strategy::DocxText => docx::extract_text(bytes),
            Strategy::LegacyDoc => legacy::extract_text(bytes, &self.config.legacy_doc_bin),
            Strategy::PlainText => {
                if !format::looks_like_text(bytes) {
                    return Err(ExtractError::Binary);
                }
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

fn significant_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Appends a labelled block of link targets not already present in `body`.
pub(crate) fn append_links(mut body: String, links: &[String]) -> String {
    let missing: Vec<&String> = links.iter().filter(|l| !body.contains(l.as_str())).collect();
    if missing.is_empty() {
        return body;
    }
    body.push_str("\n\n");
    body.push_str(LINKS_HEADER);
    for link in missing {
        body.push('\n');
        body.push_str(link);
    }
    body
}

/// Runs an external converter and returns its stdout.
pub(crate) fn run_tool<I, S>(bin: &str, args: I) -> Result<String, ExtractError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(bin).args(args).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::Tool {
            tool: bin.to_string(),
            status: output.status.to_string(),
            stderr: stderr.trim().chars().take(MAX_TOOL_STDERR).collect(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
