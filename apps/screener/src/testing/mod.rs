//! In-memory doubles for the store, blob store, LLM backend and mailbox,
//! plus document fixtures, so the pipeline runs end to end without Postgres,
//! S3, Anthropic or Microsoft Graph.

mod memory_blob_store;
mod memory_store;
mod mock_mail_source;
mod scripted_backend;

pub use memory_blob_store::MemoryBlobStore;
pub use memory_store::MemoryStore;
pub use mock_mail_source::MockMailSource;
pub use scripted_backend::ScriptedBackend;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::{Cursor, Write};

    use bytes::Bytes;
    use chrono::Utc;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use serde_json::json;
    use uuid::Uuid;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use crate::models::job::{Criterion, JobDescription};
    use crate::models::resume::{
        filename_stem, AttachmentPayload, NewResume, Resume, ResumeSource, ResumeStatus,
    };

    /// Single-page PDF with one Helvetica text line per entry and, when
    /// `link` is set, a URI link annotation.
    pub fn pdf_with_text(lines: &[&str], link: Option<&str>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 11.into()]),
            Operation::new("TL", vec![14.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for line in lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));
        let content = Content { operations }.encode().expect("encode content stream");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        if let Some(uri) = link {
            let annot_id = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Link",
                "Rect" => vec![72.into(), 700.into(), 300.into(), 720.into()],
                "A" => dictionary! {
                    "S" => "URI",
                    "URI" => Object::string_literal(uri),
                },
            });
            page.set("Annots", vec![Object::Reference(annot_id)]);
        }
        let page_id = doc.add_object(page);

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("serialize PDF");
        out
    }

    /// Minimal DOCX whose body is `body_xml` (WordprocessingML `w:` elements)
    /// with one external hyperlink relationship per entry of `links`.
    pub fn docx_with_body(body_xml: &str, links: &[&str]) -> Vec<u8> {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body_xml}</w:body></w:document>"#
        );
        let relationships: String = links
            .iter()
            .enumerate()
            .map(|(i, target)| {
                format!(
                    r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="{target}" TargetMode="External"/>"#,
                    i + 1
                )
            })
            .collect();
        let rels = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#
        );

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file("word/document.xml", options).expect("start document part");
        zip.write_all(document.as_bytes()).expect("write document part");
        if !links.is_empty() {
            zip.start_file("word/_rels/document.xml.rels", options).expect("start rels part");
            zip.write_all(rels.as_bytes()).expect("write rels part");
        }
        zip.finish().expect("finish archive").into_inner()
    }

    /// Active job whose criteria get ids `1..=n` in order.
    pub fn job_with_criteria(job_id: i64, criteria: &[&str]) -> JobDescription {
        JobDescription {
            id: job_id,
            name: format!("Job {job_id}"),
            summary: String::new(),
            active: true,
            criteria: criteria
                .iter()
                .enumerate()
                .map(|(i, detail)| Criterion {
                    id: i as i64 + 1,
                    job_id,
                    detail: detail.to_string(),
                })
                .collect(),
        }
    }

    pub fn new_resume(batch_id: &str, attachment_name: &str, email: Option<&str>, phone: &str) -> NewResume {
        NewResume {
            batch_id: batch_id.to_string(),
            attachment_name: attachment_name.to_string(),
            sender: None,
            candidate_name: filename_stem(attachment_name),
            candidate_email: email.map(str::to_string),
            candidate_phone: phone.to_string(),
            source: ResumeSource::Email,
            is_active_seeker: false,
            text_content: String::new(),
            file_url: String::new(),
            received_at: Utc::now(),
            status: ResumeStatus::Pending,
        }
    }

    /// Detached `Resume` value for pure helpers that never touch a store.
    pub fn resume(attachment_name: &str) -> Resume {
        let now = Utc::now();
        Resume {
            id: Uuid::new_v4(),
            batch_id: "batch".to_string(),
            attachment_name: attachment_name.to_string(),
            sender: None,
            candidate_name: String::new(),
            candidate_email: None,
            candidate_phone: String::new(),
            linkedin_url: String::new(),
            candidate_role: String::new(),
            candidate_company: String::new(),
            candidate_location: String::new(),
            source: ResumeSource::Email,
            is_active_seeker: false,
            is_favorite: false,
            text_content: String::new(),
            file_url: String::new(),
            received_at: now,
            created_at: now,
            status: ResumeStatus::Pending,
            rejection_email_sent: false,
            interview_email_sent: false,
            human_score: None,
            human_score_breakdown: json!({}),
        }
    }

    pub fn attachment(batch_id: &str, name: &str, source: ResumeSource, text: &str) -> AttachmentPayload {
        AttachmentPayload {
            batch_id: batch_id.to_string(),
            sender: None,
            attachment_name: name.to_string(),
            received_at: Utc::now(),
            content: Bytes::from(text.to_string()),
            source,
        }
    }
}
