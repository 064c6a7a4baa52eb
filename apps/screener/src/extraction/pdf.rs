use std::panic::{catch_unwind, AssertUnwindSafe};

use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use crate::extraction::ExtractError;

/// Hosts whose link annotations are kept in the "detected hyperlinks" block.
const PROFESSIONAL_DOMAINS: &[&str] = &[
    "linkedin.com",
    "github.com",
    "gitlab.com",
    "behance.net",
    "dribbble.com",
    "stackoverflow.com",
];

/// Text layer of every page, in page order.
///
/// The parser panics on some malformed files; that is reported as an error.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractError> {
    catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
        .map_err(|_| ExtractError::Pdf("text extraction panicked".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// URI link annotations pointing at professional-network hosts,
/// deduplicated in document order. Unreadable documents yield no links.
pub fn profile_links(bytes: &[u8]) -> Vec<String> {
    catch_unwind(AssertUnwindSafe(|| collect_links(bytes))).unwrap_or_default()
}

pub fn is_professional_link(uri: &str) -> bool {
    let lower = uri.to_ascii_lowercase();
    PROFESSIONAL_DOMAINS.iter().any(|d| lower.contains(d))
}

fn collect_links(bytes: &[u8]) -> Vec<String> {
    let doc = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("lopdf could not load document for link scan: {e}");
            return Vec::new();
        }
    };

    let mut links: Vec<String> = Vec::new();
    for page_id in doc.get_pages().values() {
        let Ok(page) = doc.get_dictionary(*page_id) else {
            continue;
        };
        let Ok(annots) = page.get(b"Annots") else {
            continue;
        };
        let Object::Array(annots) = resolve(&doc, annots) else {
            continue;
        };
        for annot in annots {
            let Some(uri) = as_dict(&doc, annot).and_then(|a| link_uri(&doc, a)) else {
                continue;
            };
            if is_professional_link(&uri) && !links.contains(&uri) {
                links.push(uri);
            }
        }
    }
    links
}

fn link_uri(doc: &Document, annot: &Dictionary) -> Option<String> {
    let action = as_dict(doc, annot.get(b"A").ok()?)?;
    match resolve(doc, action.get(b"URI").ok()?) {
        Object::String(raw, _) => Some(String::from_utf8_lossy(raw).trim().to_string()),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn as_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}
