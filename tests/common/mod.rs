//! Common test utilities and fixtures

#![allow(dead_code)]

use google_gmail1::api::{Message, MessagePart, MessagePartBody, MessagePartHeader};
use gmail_autoreply::error::Result;
use gmail_autoreply::mailbox::MailboxClient;
use gmail_autoreply::reply::ReplyGenerator;
use mockall::mock;

/// Build a header pair
pub fn header(name: &str, value: &str) -> MessagePartHeader {
    MessagePartHeader {
        name: Some(name.to_string()),
        value: Some(value.to_string()),
    }
}

/// Create a single-part plain-text message as returned by `format=full`
pub fn create_test_message(id: &str, subject: &str, from: &str, body: &str) -> Message {
    Message {
        id: Some(id.to_string()),
        thread_id: Some(format!("thread_{}", id)),
        label_ids: Some(vec!["INBOX".to_string(), "UNREAD".to_string()]),
        payload: Some(MessagePart {
            mime_type: Some("text/plain".to_string()),
            headers: Some(vec![
                header("From", from),
                header("Subject", subject),
                header("To", "me@example.com"),
            ]),
            body: Some(MessagePartBody {
                data: Some(body.as_bytes().to_vec()),
                size: Some(body.len() as i32),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Create a message whose payload has no body data at all
pub fn create_bodiless_message(id: &str, subject: &str, from: &str) -> Message {
    let mut message = create_test_message(id, subject, from, "");
    if let Some(payload) = message.payload.as_mut() {
        payload.body = None;
    }
    message
}

// Mock implementation of MailboxClient for testing
mock! {
    pub Mailbox {}

    #[async_trait::async_trait]
    impl MailboxClient for Mailbox {
        async fn list_message_ids(&self, limit: u32) -> Result<Vec<String>>;
        async fn get_message(&self, id: &str) -> Result<Message>;
        async fn create_draft(&self, rfc822: Vec<u8>) -> Result<String>;
    }
}

// Mock implementation of ReplyGenerator for testing
mock! {
    pub Generator {}

    #[async_trait::async_trait]
    impl ReplyGenerator for Generator {
        async fn generate(&self, subject: &str, sender: &str, body: &str) -> Result<String>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_message() {
        let msg = create_test_message("m1", "Lunch?", "Bob <bob@x.com>", "Are you free Friday?");
        assert_eq!(msg.id.as_deref(), Some("m1"));
        let payload = msg.payload.unwrap();
        assert_eq!(payload.headers.unwrap().len(), 3);
        assert_eq!(
            payload.body.unwrap().data.unwrap(),
            b"Are you free Friday?".to_vec()
        );
    }

    #[test]
    fn test_create_bodiless_message() {
        let msg = create_bodiless_message("m2", "Empty", "x@y.com");
        assert!(msg.payload.unwrap().body.is_none());
    }
}
