use thiserror::Error;

/// Type alias for Result with ReplyError
pub type Result<T> = std::result::Result<T, ReplyError>;

/// Error types for the auto-reply pipeline
///
/// Every variant is fatal for the run: nothing in the pipeline catches and
/// continues past one of these.
#[derive(Error, Debug)]
pub enum ReplyError {
    /// No client-secret configuration is available for the consent flow
    #[error("Authentication configuration error: {0}")]
    AuthConfiguration(String),

    /// Interactive consent flow was aborted or denied
    #[error("Authentication flow failed: {0}")]
    AuthFlow(String),

    /// Provider rejected the refresh token
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// Listing or reading messages failed (authorization or transport)
    #[error("Mailbox access error: {0}")]
    MailboxAccess(String),

    /// Message body is missing or cannot be decoded as text
    #[error("Content decoding error: {0}")]
    ContentDecoding(String),

    /// Completion request failed or returned nothing usable
    #[error("Completion service error: {0}")]
    CompletionService(String),

    /// Saving the reply as a draft failed
    #[error("Draft creation error: {0}")]
    DraftCreation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Render a provider error into a readable message
///
/// Non-success responses are reported by status code and canonical reason,
/// everything else by the transport error's own description.
pub fn describe_api_error(error: &google_gmail1::Error) -> String {
    match error {
        google_gmail1::Error::Failure(response) => {
            let status = response.status();
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )
        }
        google_gmail1::Error::BadRequest(err) => format!("Bad request: {}", err),
        google_gmail1::Error::HttpError(err) => format!("Connection error: {}", err),
        google_gmail1::Error::Io(err) => format!("IO error: {}", err),
        other => other.to_string(),
    }
}

impl ReplyError {
    /// Map a provider error raised while listing or reading messages
    ///
    /// The provider client decodes base64url body data while deserializing
    /// the response, so a JSON decode failure there is a content problem.
    pub fn from_read_error(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::JsonDecodeError(body, err) => ReplyError::ContentDecoding(
                format!("Undecodable message payload ({}): {} bytes", err, body.len()),
            ),
            other => ReplyError::MailboxAccess(describe_api_error(&other)),
        }
    }

    /// Map a provider error raised while creating a draft
    pub fn from_draft_error(error: google_gmail1::Error) -> Self {
        ReplyError::DraftCreation(describe_api_error(&error))
    }

    /// Short stable name of the error kind, used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ReplyError::AuthConfiguration(_) => "auth_configuration",
            ReplyError::AuthFlow(_) => "auth_flow",
            ReplyError::TokenRefresh(_) => "token_refresh",
            ReplyError::MailboxAccess(_) => "mailbox_access",
            ReplyError::ContentDecoding(_) => "content_decoding",
            ReplyError::CompletionService(_) => "completion_service",
            ReplyError::DraftCreation(_) => "draft_creation",
            ReplyError::Config(_) => "config",
            ReplyError::Io(_) => "io",
            ReplyError::Serialization(_) => "serialization",
        }
    }
}

impl From<async_openai::error::OpenAIError> for ReplyError {
    fn from(error: async_openai::error::OpenAIError) -> Self {
        ReplyError::CompletionService(error.to_string())
    }
}
