use std::path::Path;

use tracing::debug;

/// Container format of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    /// Office Open XML (ZIP container).
    Docx,
    /// Word 97-2003 binary (OLE compound file).
    LegacyDoc,
    Text,
    Unknown,
}

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
/// Some generators emit a few junk bytes before the PDF header.
const PDF_HEADER_WINDOW: usize = 1024;

impl DocumentFormat {
    /// Classifies by extension. Magic bytes decide when the extension is
    /// missing, unknown, or contradicts the content (e.g. a DOCX saved as `.doc`).
    pub fn classify(filename: &str, bytes: &[u8]) -> Self {
        let by_extension = Self::from_extension(filename);
        let by_magic = Self::sniff(bytes);

        match (by_extension, by_magic) {
            (Some(ext), None) => ext,
            (Some(ext), Some(magic)) if ext == magic => ext,
            (Some(ext), Some(magic)) => {
                debug!("{filename}: extension says {ext:?}, content says {magic:?}; trusting content");
                magic
            }
            (None, Some(magic)) => magic,
            (None, None) if looks_like_text(bytes) => DocumentFormat::Text,
            (None, None) => DocumentFormat::Unknown,
        }
    }

    fn from_extension(filename: &str) -> Option<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "doc" => Some(DocumentFormat::LegacyDoc),
            "txt" | "text" | "md" => Some(DocumentFormat::Text),
            _ => None,
        }
    }

    fn sniff(bytes: &[u8]) -> Option<Self> {
        let head = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
        if bytes.starts_with(ZIP_MAGIC) {
            Some(DocumentFormat::Docx)
        } else if bytes.starts_with(OLE_MAGIC) {
            Some(DocumentFormat::LegacyDoc)
        } else if head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
            Some(DocumentFormat::Pdf)
        } else {
            None
        }
    }
}

/// True when at most 10% of the leading sample is control or invalid UTF-8.
pub fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    let sample = String::from_utf8_lossy(&bytes[..bytes.len().min(4096)]);
    let total = sample.chars().count().max(1);
    let suspicious = sample
        .chars()
        .filter(|c| *c == '\u{FFFD}' || (c.is_control() && !c.is_whitespace()))
        .count();
    suspicious * 10 <= total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_wins_when_consistent() {
        assert_eq!(
            DocumentFormat::classify("cv.pdf", b"%PDF-1.7 ..."),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::classify("cv.txt", b"plain words"),
            DocumentFormat::Text
        );
    }

    #[test]
    fn test_doc_extension_with_zip_content_is_docx() {
        assert_eq!(
            DocumentFormat::classify("resume.doc", b"PK\x03\x04rest-of-zip"),
            DocumentFormat::Docx
        );
    }

    #[test]
    fn test_sniffs_when_extension_missing() {
        assert_eq!(
            DocumentFormat::classify("attachment", b"%PDF-1.4"),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::classify("attachment", OLE_MAGIC),
            DocumentFormat::LegacyDoc
        );
        assert_eq!(
            DocumentFormat::classify("attachment.bin", b"Jane Doe\nEngineer"),
            DocumentFormat::Text
        );
        assert_eq!(
            DocumentFormat::classify("attachment", &[0u8, 1, 2, 3, 0xff, 0xfe]),
            DocumentFormat::Unknown
        );
    }

    #[test]
    fn test_pdf_header_after_junk_prefix() {
        let mut bytes = vec![b'\n'; 16];
        bytes.extend_from_slice(b"%PDF-1.5");
        assert_eq!(DocumentFormat::classify("scan", &bytes), DocumentFormat::Pdf);
    }
}
