use std::ffi::OsStr;
use std::path::PathBuf;

use tempfile::TempDir;
use tracing::{debug, warn};

use super::{run_tool, ExtractError, ExtractionConfig};

const RENDER_DPI: &str = "300";

/// Rasterizes every page with `pdftoppm` and runs `tesseract` over each
/// image. Scratch files live in a temp dir removed on return.
pub fn ocr_pdf(bytes: &[u8], config: &ExtractionConfig) -> Result<String, ExtractError> {
    let scratch = TempDir::new()?;
    let input = scratch.path().join("input.pdf");
    std::fs::write(&input, bytes)?;

    let prefix = scratch.path().join("page");
    run_tool(
        &config.pdftoppm_bin,
        [
            OsStr::new("-r"),
            OsStr::new(RENDER_DPI),
            OsStr::new("-png"),
            input.as_os_str(),
            prefix.as_os_str(),
        ],
    )?;

    // pdftoppm zero-pads page numbers, so lexical order is page order.
    let mut pages: Vec<PathBuf> = std::fs::read_dir(scratch.path())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension().is_some_and(|e| e == "png")
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("page"))
        })
        .collect();
    pages.sort();

    if pages.is_empty() {
        return Err(ExtractError::Tool {
            tool: config.pdftoppm_bin.clone(),
            status: "ok".to_string(),
            stderr: "no pages rendered".to_string(),
        });
    }
    debug!("OCR over {} rendered page(s)", pages.len());

    let mut texts = Vec::with_capacity(pages.len());
    let mut last_error = None;
    for page in &pages {
        match run_tool(&config.tesseract_bin, [page.as_os_str(), OsStr::new("stdout")]) {
            Ok(text) => texts.push(text),
            Err(e) => {
                warn!("tesseract failed on {}: {e}", page.display());
                last_error = Some(e);
            }
        }
    }

    match (texts.is_empty(), last_error) {
        (true, Some(e)) => Err(e),
        _ => Ok(texts.join("\n")),
    }
}
