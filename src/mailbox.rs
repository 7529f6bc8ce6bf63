//! Mailbox access over the Gmail API

use async_trait::async_trait;
use google_gmail1::api::{Draft, Message};
use google_gmail1::hyper::{self, header};
use tracing::debug;

use crate::auth::{GmailHub, COMPOSE_SCOPE, READONLY_SCOPE};
use crate::content::{extract_content, MessageContent};
use crate::error::{ReplyError, Result};

/// Root of the Gmail REST endpoints
pub const GMAIL_ROOT_URL: &str = "https://gmail.googleapis.com/";

/// Message identifier as returned by a list call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    pub id: String,
}

/// Trait defining mailbox operations for easier testing
#[async_trait]
pub trait MailboxClient: Send + Sync {
    /// List up to `limit` message ids in provider order
    async fn list_message_ids(&self, limit: u32) -> Result<Vec<String>>;

    /// Fetch the full representation of one message
    async fn get_message(&self, id: &str) -> Result<Message>;

    /// Save an RFC 822 message as a draft, returning the draft id
    async fn create_draft(&self, rfc822: Vec<u8>) -> Result<String>;
}

/// Gmail-backed mailbox for one user
pub struct GmailMailbox {
    hub: GmailHub,
    user_id: String,
}

impl GmailMailbox {
    pub fn new(hub: GmailHub, user_id: impl Into<String>) -> Self {
        Self {
            hub,
            user_id: user_id.into(),
        }
    }

    /// Get the inner hub reference
    pub fn hub(&self) -> &GmailHub {
        &self.hub
    }

    /// Address of the authenticated account
    pub async fn account_address(&self) -> Result<String> {
        let (_, profile) = self
            .hub
            .users()
            .get_profile(&self.user_id)
            .add_scope(READONLY_SCOPE)
            .doit()
            .await
            .map_err(ReplyError::from_read_error)?;

        Ok(profile.email_address.unwrap_or_default())
    }
}

#[async_trait]
impl MailboxClient for GmailMailbox {
    async fn list_message_ids(&self, limit: u32) -> Result<Vec<String>> {
        debug!("Listing up to {} messages", limit);
        let (_, response) = self
            .hub
            .users()
            .messages_list(&self.user_id)
            .max_results(limit)
            .add_scope(READONLY_SCOPE)
            .doit()
            .await
            .map_err(ReplyError::from_read_error)?;

        let ids: Vec<String> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| msg.id)
            .collect();

        debug!("List returned {} message ids", ids.len());
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<Message> {
        debug!("Fetching message {}", id);
        let (_, message) = self
            .hub
            .users()
            .messages_get(&self.user_id, id)
            .format("full")
            .add_scope(READONLY_SCOPE)
            .doit()
            .await
            .map_err(ReplyError::from_read_error)?;

        Ok(message)
    }

    async fn create_draft(&self, rfc822: Vec<u8>) -> Result<String> {
        use google_gmail1::common::{self, GetToken as _};

        // The generated client only exposes media upload for drafts.create, so
        // the `raw` JSON form goes out over the hub's own transport and token
        let body = draft_request_body(rfc822)?;
        let url = format!("{}gmail/v1/users/{}/drafts", GMAIL_ROOT_URL, self.user_id);
        debug!("Creating draft ({} byte request)", body.len());

        let token = self
            .hub
            .auth
            .get_token(&[COMPOSE_SCOPE])
            .await
            .map_err(|e| ReplyError::from_draft_error(google_gmail1::Error::MissingToken(e)))?;

        let mut request = hyper::Request::builder()
            .method(hyper::Method::POST)
            .uri(url.as_str())
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = request
            .body(common::to_body(Some(body)))
            .map_err(|e| ReplyError::DraftCreation(format!("Invalid draft request: {}", e)))?;

        let response = self
            .hub
            .client
            .request(request)
            .await
            .map_err(|e| ReplyError::from_draft_error(google_gmail1::Error::HttpError(e)))?;

        let (parts, body) = response.into_parts();
        let bytes = common::to_bytes(body).await.unwrap_or_default();
        if !parts.status.is_success() {
            let failure = common::to_response(parts, Some(bytes));
            return Err(ReplyError::from_draft_error(google_gmail1::Error::Failure(
                failure,
            )));
        }

        let id = draft_id_from_response(&bytes)?;
        debug!("Created draft {}", id);
        Ok(id)
    }
}

/// JSON body of a draft-create request, `{"message": {"raw": ...}}`
///
/// The provider types serialize `raw` with the URL-safe base64 alphabet.
pub fn draft_request_body(rfc822: Vec<u8>) -> Result<Vec<u8>> {
    let draft = Draft {
        message: Some(Message {
            raw: Some(rfc822),
            ..Default::default()
        }),
        ..Default::default()
    };
    let mut value = serde_json::to_value(&draft)?;
    google_gmail1::common::remove_json_null_values(&mut value);
    Ok(serde_json::to_vec(&value)?)
}

/// Draft id from a successful draft-create response
pub fn draft_id_from_response(body: &[u8]) -> Result<String> {
    let draft: Draft = serde_json::from_slice(body).map_err(|e| {
        ReplyError::from_draft_error(google_gmail1::Error::JsonDecodeError(
            String::from_utf8_lossy(body).into_owned(),
            e,
        ))
    })?;

    draft
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ReplyError::DraftCreation("Provider returned a draft without an id".to_string()))
}

/// List up to `limit` recent messages
///
/// Order is whatever the provider returns; an empty mailbox yields an empty list.
pub async fn list_recent<C>(client: &C, limit: u32) -> Result<Vec<MessageSummary>>
where
    C: MailboxClient + ?Sized,
{
    if limit == 0 {
        return Err(ReplyError::Config(
            "message limit must be a positive integer".to_string(),
        ));
    }

    let ids = client.list_message_ids(limit).await?;
    Ok(ids
        .into_iter()
        .take(limit as usize)
        .map(|id| MessageSummary { id })
        .collect())
}

/// Fetch and decode one message's subject, sender, and body
pub async fn fetch_content<C>(client: &C, id: &str) -> Result<MessageContent>
where
    C: MailboxClient + ?Sized,
{
    let message = client.get_message(id).await?;
    extract_content(&message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE, Engine as _};
    use google_gmail1::api::{MessagePart, MessagePartBody, MessagePartHeader};
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        Mailbox {}

        #[async_trait]
        impl MailboxClient for Mailbox {
            async fn list_message_ids(&self, limit: u32) -> Result<Vec<String>>;
            async fn get_message(&self, id: &str) -> Result<Message>;
            async fn create_draft(&self, rfc822: Vec<u8>) -> Result<String>;
        }
    }

    #[tokio::test]
    async fn test_list_recent_wraps_ids() {
        let mut mailbox = MockMailbox::new();
        mailbox
            .expect_list_message_ids()
            .with(eq(2))
            .times(1)
            .returning(|_| Ok(vec!["a".to_string(), "b".to_string()]));

        let summaries = list_recent(&mailbox, 2).await.unwrap();
        assert_eq!(
            summaries,
            vec![
                MessageSummary { id: "a".to_string() },
                MessageSummary { id: "b".to_string() }
            ]
        );
    }

    #[tokio::test]
    async fn test_list_recent_caps_at_limit() {
        let mut mailbox = MockMailbox::new();
        mailbox
            .expect_list_message_ids()
            .returning(|_| Ok((0..5).map(|i| format!("m{}", i)).collect()));

        let summaries = list_recent(&mailbox, 3).await.unwrap();
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].id, "m0");
    }

    #[tokio::test]
    async fn test_list_recent_empty_mailbox() {
        let mut mailbox = MockMailbox::new();
        mailbox.expect_list_message_ids().returning(|_| Ok(vec![]));

        assert!(list_recent(&mailbox, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_recent_rejects_zero_limit() {
        let mut mailbox = MockMailbox::new();
        mailbox.expect_list_message_ids().times(0);

        let result = list_recent(&mailbox, 0).await;
        assert!(matches!(result, Err(ReplyError::Config(_))));
    }

    #[tokio::test]
    async fn test_list_failure_propagates() {
        let mut mailbox = MockMailbox::new();
        mailbox
            .expect_list_message_ids()
            .returning(|_| Err(ReplyError::MailboxAccess("HTTP 401: Unauthorized".to_string())));

        let result = list_recent(&mailbox, 10).await;
        assert!(matches!(result, Err(ReplyError::MailboxAccess(_))));
    }

    #[tokio::test]
    async fn test_fetch_content_extracts() {
        let mut mailbox = MockMailbox::new();
        mailbox
            .expect_get_message()
            .with(eq("m1"))
            .returning(|id| {
                Ok(Message {
                    id: Some(id.to_string()),
                    payload: Some(MessagePart {
                        headers: Some(vec![MessagePartHeader {
                            name: Some("From".to_string()),
                            value: Some("Bob <bob@x.com>".to_string()),
                        }]),
                        body: Some(MessagePartBody {
                            data: Some(b"Are you free Friday?".to_vec()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
            });

        let content = fetch_content(&mailbox, "m1").await.unwrap();
        assert_eq!(content.subject, "No Subject");
        assert_eq!(content.sender, "Bob <bob@x.com>");
        assert_eq!(content.body_text, "Are you free Friday?");
    }

    #[test]
    fn test_draft_request_body_carries_urlsafe_raw() {
        // Encodes to "-__--__-" in the URL-safe alphabet, "+//++//+" in the standard one
        let rfc822 = vec![0xfb, 0xff, 0xfe, 0xfb, 0xff, 0xfe];

        let body = draft_request_body(rfc822.clone()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json.as_object().unwrap().len(), 1);
        let message = json["message"].as_object().unwrap();
        assert_eq!(message.len(), 1);

        let raw = message["raw"].as_str().unwrap();
        assert_eq!(raw, "-__--__-");
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));
        assert_eq!(URL_SAFE.decode(raw).unwrap(), rfc822);
    }

    #[test]
    fn test_draft_request_body_parses_back_as_mime() {
        use mailparse::MailHeaderMap;

        let rendered =
            crate::compose::ReplyDraft::new("bob@x.com", "Lunch?", "Sure, Friday works!").to_rfc822();
        let body = draft_request_body(rendered.clone()).unwrap();

        let draft: Draft = serde_json::from_slice(&body).unwrap();
        let raw = draft.message.unwrap().raw.unwrap();
        assert_eq!(raw, rendered);
        let parsed = mailparse::parse_mail(&raw).unwrap();
        assert_eq!(parsed.headers.get_first_value("To").unwrap(), "bob@x.com");
        assert_eq!(parsed.headers.get_first_value("Subject").unwrap(), "Re: Lunch?");
        assert_eq!(parsed.get_body().unwrap().trim_end(), "Sure, Friday works!");
    }

    #[test]
    fn test_draft_id_from_response() {
        let body = br#"{"id": "r-123", "message": {"id": "m-9", "threadId": "t-1"}}"#;
        assert_eq!(draft_id_from_response(body).unwrap(), "r-123");
    }

    #[test]
    fn test_draft_response_without_id_is_error() {
        let result = draft_id_from_response(br#"{"message": {"id": "m-9"}}"#);
        assert!(matches!(result, Err(ReplyError::DraftCreation(_))));

        let result = draft_id_from_response(br#"{"id": ""}"#);
        assert!(matches!(result, Err(ReplyError::DraftCreation(_))));
    }

    #[test]
    fn test_draft_response_undecodable_is_error() {
        let result = draft_id_from_response(b"<html>oops</html>");
        assert!(matches!(result, Err(ReplyError::DraftCreation(_))));
    }
}
