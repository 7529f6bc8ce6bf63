//! Subject, sender, and body extraction from full-format messages

use google_gmail1::api::{Message, MessagePart, MessagePartHeader};

use crate::error::{ReplyError, Result};

/// Subject used when the message carries no `Subject` header
pub const NO_SUBJECT: &str = "No Subject";

/// Sender used when the message carries no `From` header
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Decoded content of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    pub subject: String,
    pub sender: String,
    pub body_text: String,
}

/// Extract content from a message fetched with `format=full`
///
/// Headers match by exact name. When the payload is multipart only the first
/// part is read; nested structures and later parts are ignored.
pub fn extract_content(message: &Message) -> Result<MessageContent> {
    let id = message.id.as_deref().unwrap_or("<unknown>");
    let payload = message
        .payload
        .as_ref()
        .ok_or_else(|| ReplyError::ContentDecoding(format!("Message {} has no payload", id)))?;

    let headers = payload.headers.as_deref().unwrap_or_default();
    let subject = header_value(headers, "Subject").unwrap_or(NO_SUBJECT).to_string();
    let sender = header_value(headers, "From").unwrap_or(UNKNOWN_SENDER).to_string();

    let body_text = decode_body(id, payload)?;

    Ok(MessageContent {
        subject,
        sender,
        body_text,
    })
}

/// First header with exactly this name
pub fn header_value<'a>(headers: &'a [MessagePartHeader], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.as_deref() == Some(name))
        .and_then(|h| h.value.as_deref())
}

fn decode_body(id: &str, payload: &MessagePart) -> Result<String> {
    let part = match payload.parts.as_ref() {
        Some(parts) => parts.first().ok_or_else(|| {
            ReplyError::ContentDecoding(format!("Message {} has an empty parts list", id))
        })?,
        None => payload,
    };

    // The provider client has already undone the base64url transport encoding
    let data = part
        .body
        .as_ref()
        .and_then(|b| b.data.as_ref())
        .ok_or_else(|| ReplyError::ContentDecoding(format!("Message {} has no body data", id)))?;

    String::from_utf8(data.clone()).map_err(|e| {
        ReplyError::ContentDecoding(format!("Message {} body is not valid UTF-8: {}", id, e))
    })
}

/// Recipient address for a reply to `sender`
///
/// Takes the text after the last `<` and strips trailing `>`. Without any
/// `<` the sender string is returned as is, valid address or not.
pub fn recipient_address(sender: &str) -> &str {
    match sender.rfind('<') {
        Some(start) => sender[start + 1..].trim_end_matches('>'),
        None => sender,
    }
}
