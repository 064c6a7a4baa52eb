use std::io::Write;

use super::{run_tool, ExtractError};

/// Converts a Word 97-2003 file through an external converter that prints
/// plain text to stdout (antiword by default). The temp file is removed
/// when it drops.
pub fn extract_text(bytes: &[u8], converter: &str) -> Result<String, ExtractError> {
    let mut file = tempfile::Builder::new()
        .prefix("resume-")
        .suffix(".doc")
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;

    run_tool(converter, [file.path().as_os_str()])
}
