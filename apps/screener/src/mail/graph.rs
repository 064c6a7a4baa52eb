use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{is_allowed_attachment, MailError, MailSource};
use crate::config::MailConfig;
use crate::models::resume::{AttachmentPayload, ResumeSource};

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_PAGE_SIZE: usize = 100;
const DEFAULT_PAGE_SIZE: usize = 50;
const ATTACHMENT_WORKERS: usize = 8;

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    value: Vec<GraphMessage>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GraphMessage {
    id: String,
    #[serde(rename = "receivedDateTime")]
    received_date_time: Option<String>,
    from: Option<GraphRecipient>,
}

#[derive(Debug, Clone, Deserialize)]
struct GraphRecipient {
    #[serde(rename = "emailAddress")]
    email_address: Option<GraphEmailAddress>,
}

#[derive(Debug, Clone, Deserialize)]
struct GraphEmailAddress {
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttachmentPage {
    #[serde(default)]
    value: Vec<GraphAttachment>,
}

#[derive(Debug, Deserialize)]
struct GraphAttachment {
    name: Option<String>,
    #[serde(rename = "contentBytes")]
    content_bytes: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// GraphMailSource
// ────────────────────────────────────────────────────────────────────────────

/// Microsoft 365 mailbox via Graph, authenticated with client credentials.
#[derive(Clone)]
pub struct GraphMailSource {
    http: Client,
    config: MailConfig,
}

struct Credentials<'a> {
    tenant_id: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

impl GraphMailSource {
    pub fn new(config: MailConfig) -> Self {
        Self {
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            config,
        }
    }

    fn credentials(&self) -> Option<Credentials<'_>> {
        Some(Credentials {
            tenant_id: self.config.tenant_id.as_deref()?,
            client_id: self.config.client_id.as_deref()?,
            client_secret: self.config.client_secret.as_deref()?,
        })
    }

    fn messages_base(&self) -> String {
        format!("{GRAPH_BASE}/users/{}/messages", self.config.user_id)
    }

    async fn acquire_token(&self, creds: &Credentials<'_>) -> Result<String, MailError> {
        let url = format!("{LOGIN_BASE}/{}/oauth2/v2.0/token", creds.tenant_id);
        let response: TokenResponse = self
            .http
            .post(url)
            .form(&[
                ("client_id", creds.client_id),
                ("client_secret", creds.client_secret),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?
            .json()
            .await?;

        response.access_token.ok_or_else(|| {
            MailError::Auth(
                response
                    .error_description
                    .unwrap_or_else(|| "no access_token in response".to_string()),
            )
        })
    }

    /// Walks the message listing. The `hasAttachments` filter is dropped
    /// once if the mailbox rejects it as `InefficientFilter`.
    async fn list_messages(
        &self,
        token: &str,
        limit: usize,
        fetch_all: bool,
    ) -> Result<Vec<GraphMessage>, MailError> {
        let base = self.messages_base();
        let top = page_size(limit);

        let mut messages: Vec<GraphMessage> = Vec::new();
        let mut next_url = Some(messages_url(&base, top, true)?);
        let mut attempted_fallback = false;

        while let Some(url) = next_url.take() {
            let response = self.http.get(url).bearer_auth(token).send().await?;
            let status = response.status();
            let body: Value = response.json().await.unwrap_or_default();

            if !status.is_success() {
                let code = body
                    .pointer("/error/code")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if !attempted_fallback && code == "InefficientFilter" {
                    warn!("Mailbox rejected hasAttachments filter; retrying unfiltered");
                    attempted_fallback = true;
                    next_url = Some(messages_url(&base, top, false)?);
                    continue;
                }
                warn!("Message listing failed ({status}): {code}");
                break;
            }

            let page: MessagePage = serde_json::from_value(body)?;
            messages.extend(page.value);

            if !fetch_all && messages.len() >= limit {
                messages.truncate(limit);
                break;
            }
            if fetch_all {
                next_url = page
                    .next_link
                    .map(|link| Url::parse(&link).map_err(|e| MailError::Url(e.to_string())))
                    .transpose()?;
            }
        }

        Ok(messages)
    }

    async fn attachments_for(
        &self,
        token: &str,
        message: &GraphMessage,
    ) -> Result<Vec<AttachmentPayload>, MailError> {
        let url = format!("{}/{}/attachments", self.messages_base(), message.id);
        let response = self.http.get(url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            warn!(
                "Attachment listing for message {} failed ({})",
                message.id,
                response.status()
            );
            return Ok(Vec::new());
        }
        let page: AttachmentPage = response.json().await?;
        Ok(parse_attachments(message, page))
    }
}

#[async_trait]
impl MailSource for GraphMailSource {
    fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }

    async fn fetch_recent(
        &self,
        limit: usize,
        fetch_all: bool,
    ) -> Result<Vec<AttachmentPayload>, MailError> {
        let Some(creds) = self.credentials() else {
            debug!("Mailbox not configured; nothing to fetch");
            return Ok(Vec::new());
        };

        let token: Arc<str> = self.acquire_token(&creds).await?.into();
        let messages = self.list_messages(&token, limit, fetch_all).await?;
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        info!("Fetching attachments for {} message(s)", messages.len());

        let permits = Arc::new(Semaphore::new(ATTACHMENT_WORKERS.min(messages.len())));
        let mut tasks = JoinSet::new();
        for message in messages {
            let source = self.clone();
            let token = token.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                match source.attachments_for(&token, &message).await {
                    Ok(found) => Some(found),
                    Err(e) => {
                        warn!("Attachments for message {} failed: {e}", message.id);
                        None
                    }
                }
            });
        }

        let mut attachments = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(found)) => attachments.extend(found),
                Ok(None) => {}
                Err(e) => warn!("Attachment worker aborted: {e}"),
            }
        }
        Ok(attachments)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pure helpers
// ────────────────────────────────────────────────────────────────────────────

fn page_size(limit: usize) -> usize {
    if limit == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAX_PAGE_SIZE)
    }
}

fn messages_url(base: &str, top: usize, only_with_attachments: bool) -> Result<Url, MailError> {
    let top = top.to_string();
    let mut params = vec![("$orderby", "receivedDateTime desc"), ("$top", top.as_str())];
    if only_with_attachments {
        params.insert(0, ("$filter", "hasAttachments eq true"));
    }
    Url::parse_with_params(base, &params).map_err(|e| MailError::Url(e.to_string()))
}

/// Keeps allow-listed attachments with decodable inline content.
pub(crate) fn parse_attachments(message: &GraphMessage, page: AttachmentPage) -> Vec<AttachmentPayload> {
    let sender = message
        .from
        .as_ref()
        .and_then(|f| f.email_address.as_ref())
        .and_then(|a| a.address.clone());
    let received_at = message
        .received_date_time
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    page.value
        .into_iter()
        .filter_map(|attachment| {
            let encoded = attachment.content_bytes.filter(|c| !c.is_empty())?;
            let name = attachment.name.unwrap_or_else(|| "attachment".to_string());
            if !is_allowed_attachment(&name) {
                return None;
            }
            let content = match BASE64.decode(encoded.as_bytes()) {
                Ok(content) => content,
                Err(e) => {
                    debug!("Skipping {name} on message {}: bad base64 ({e})", message.id);
                    return None;
                }
            };
            Some(AttachmentPayload {
                batch_id: message.id.clone(),
                sender: sender.clone(),
                attachment_name: name,
                received_at,
                content: Bytes::from(content),
                source: ResumeSource::Email,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message() -> GraphMessage {
        serde_json::from_value(json!({
            "id": "AAMkAGI2",
            "receivedDateTime": "2024-03-01T09:30:00Z",
            "from": {"emailAddress": {"address": "jane@example.com", "name": "Jane"}}
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_attachments_filters_and_decodes() {
        let page: AttachmentPage = serde_json::from_value(json!({
            "value": [
                {"name": "Jane_Doe.pdf", "contentBytes": BASE64.encode(b"%PDF-1.4")},
                {"name": "logo.png", "contentBytes": BASE64.encode(b"png")},
                {"name": "notes.txt", "contentBytes": "***not base64***"},
                {"name": "empty.docx"}
            ]
        }))
        .unwrap();

        let found = parse_attachments(&message(), page);

        assert_eq!(found.len(), 1);
        let payload = &found[0];
        assert_eq!(payload.batch_id, "AAMkAGI2");
        assert_eq!(payload.attachment_name, "Jane_Doe.pdf");
        assert_eq!(payload.sender.as_deref(), Some("jane@example.com"));
        assert_eq!(payload.content, Bytes::from_static(b"%PDF-1.4"));
        assert_eq!(payload.received_at.to_rfc3339(), "2024-03-01T09:30:00+00:00");
        assert_eq!(payload.source, ResumeSource::Email);
    }

    #[test]
    fn test_messages_url_filter_toggle() {
        let base = "https://graph.microsoft.com/v1.0/users/me/messages";

        let filtered = messages_url(base, 5, true).unwrap();
        let unfiltered = messages_url(base, 5, false).unwrap();

        let query: Vec<(String, String)> = filtered.query_pairs().into_owned().collect();
        assert!(query.contains(&("$filter".to_string(), "hasAttachments eq true".to_string())));
        assert!(query.contains(&("$top".to_string(), "5".to_string())));
        assert!(!unfiltered.as_str().contains("filter"));
    }

    #[test]
    fn test_page_size_bounds() {
        assert_eq!(page_size(0), DEFAULT_PAGE_SIZE);
        assert_eq!(page_size(5), 5);
        assert_eq!(page_size(500), MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_unconfigured_source_returns_nothing() {
        let source = GraphMailSource::new(MailConfig {
            tenant_id: None,
            client_id: Some("id".to_string()),
            client_secret: None,
            user_id: "me".to_string(),
        });

        assert!(!source.is_configured());
        assert!(source.fetch_recent(5, false).await.unwrap().is_empty());
    }
}
