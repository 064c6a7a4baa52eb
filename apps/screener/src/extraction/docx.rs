use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::extraction::ExtractError;

const DOCUMENT_PART: &str = "word/document.xml";
const RELS_PART: &str = "word/_rels/document.xml.rels";
const TABLE_CELL_SEPARATOR: &str = " | ";

/// Paragraph text, with each table row flattened to one line of cells,
/// followed by the hyperlink targets declared in the relationships part.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(e.to_string()))?;

    let document = read_part(&mut archive, DOCUMENT_PART)?
        .ok_or_else(|| ExtractError::Docx(format!("missing {DOCUMENT_PART}")))?;
    let body = document_text(&document)?;

    let links = match read_part(&mut archive, RELS_PART)? {
        Some(rels) => hyperlink_targets(&rels)?,
        None => Vec::new(),
    };

    Ok(super::append_links(body, &links))
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, ExtractError> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ExtractError::Docx(e.to_string())),
    };
    let mut content = String::new();
    part.read_to_string(&mut content)?;
    Ok(Some(content))
}

fn xml_error(e: quick_xml::Error) -> ExtractError {
    ExtractError::Docx(e.to_string())
}

fn document_text(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);

    let mut lines: Vec<String> = Vec::new();
    let mut paragraph = String::new();
    let mut in_run_text = false;
    let mut table_depth = 0usize;
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:t" => in_run_text = true,
                b"w:tbl" => table_depth += 1,
                b"w:tr" if table_depth == 1 => row.clear(),
                b"w:tc" if table_depth == 1 => cell.clear(),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => paragraph.push('\t'),
                b"w:br" | b"w:cr" => paragraph.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_run_text => {
                paragraph.push_str(&t.unescape().map_err(xml_error)?);
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => {
                    let text = std::mem::take(&mut paragraph);
                    if table_depth == 0 {
                        lines.push(text);
                    } else if !text.trim().is_empty() {
                        if !cell.is_empty() {
                            cell.push(' ');
                        }
                        cell.push_str(text.trim());
                    }
                }
                b"w:tc" if table_depth == 1 => row.push(std::mem::take(&mut cell)),
                b"w:tr" if table_depth == 1 => {
                    let line = row
                        .drain(..)
                        .filter(|c| !c.trim().is_empty())
                        .collect::<Vec<_>>()
                        .join(TABLE_CELL_SEPARATOR);
                    if !line.is_empty() {
                        lines.push(line);
                    }
                }
                b"w:tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(lines.join("\n"))
}

fn hyperlink_targets(xml: &str) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut targets: Vec<String> = Vec::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut kind = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().map_err(xml_error)?.into_owned();
                    match attr.key.as_ref() {
                        b"Type" => kind = Some(value),
                        b"Target" => target = Some(value),
                        _ => {}
                    }
                }
                if let (Some(kind), Some(target)) = (kind, target) {
                    if kind.ends_with("/hyperlink") && !targets.contains(&target) {
                        targets.push(target);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(targets)
}
