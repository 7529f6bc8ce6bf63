//! Reply drafts: construction, MIME rendering, and submission

use lettre::message::header::{self, ContentType, Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, Mailboxes, SinglePart};
use tracing::debug;

use crate::content::{recipient_address, MessageContent};
use crate::error::Result;
use crate::mailbox::MailboxClient;

/// Prefix added to every reply subject
pub const REPLY_PREFIX: &str = "Re: ";

/// A reply ready to be saved as a draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDraft {
    pub recipient: String,
    pub subject: String,
    pub body_text: String,
}

impl ReplyDraft {
    pub fn new(recipient: &str, original_subject: &str, body_text: &str) -> Self {
        Self {
            recipient: recipient.to_string(),
            subject: reply_subject(original_subject),
            body_text: body_text.to_string(),
        }
    }

    /// Reply to `content` carrying the generated `reply` text
    pub fn for_message(content: &MessageContent, reply: &str) -> Self {
        Self::new(recipient_address(&content.sender), &content.subject, reply)
    }

    /// Render as a single-part `text/plain` RFC 822 message
    ///
    /// Header encoding and folding and the body transfer encoding are left
    /// to lettre. A recipient that does not parse as an address is written
    /// into `To` as plain text.
    pub fn to_rfc822(&self) -> Vec<u8> {
        let recipient = header_text(&self.recipient);
        let part = SinglePart::builder().header(header::MIME_VERSION_1_0);
        let part = match recipient.parse::<Mailbox>() {
            Ok(mailbox) => part.header(header::To::from(Mailboxes::from(mailbox))),
            Err(_) => {
                debug!("Recipient {:?} is not an address, writing it verbatim", recipient);
                part.header(PlainTo(recipient))
            }
        };

        part.header(header::Subject::from(header_text(&self.subject)))
            .content_type(ContentType::TEXT_PLAIN)
            .body(self.body_text.clone())
            .formatted()
    }
}

/// `To` header carrying unparsed text
#[derive(Debug, Clone)]
struct PlainTo(String);

impl Header for PlainTo {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("To")
    }

    fn parse(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// `"Re: "` plus the original subject, applied unconditionally
pub fn reply_subject(original: &str) -> String {
    format!("{}{}", REPLY_PREFIX, original)
}

/// Header values never carry line breaks
fn header_text(value: &str) -> String {
    value
        .split(|c| c == '\r' || c == '\n')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Save `draft` in the mailbox without sending it; returns the provider's draft id
///
/// A provider response without an id is a `DraftCreation` error.
pub async fn create_draft<C>(client: &C, draft: &ReplyDraft) -> Result<String>
where
    C: MailboxClient + ?Sized,
{
    let raw = draft.to_rfc822();
    debug!(
        "Creating draft to {} ({} bytes)",
        draft.recipient,
        raw.len()
    );
    client.create_draft(raw).await
}
