//! Gmail Auto-Reply
//!
//! Reads the most recent messages in a Gmail mailbox, asks a chat completion
//! service to write a polite reply to each, and saves every reply as an
//! unsent draft in the same mailbox.
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_autoreply::{auth, config::{CompletionSettings, Config}, pipeline};
//! use gmail_autoreply::{mailbox::GmailMailbox, reply::OpenAiReplyGenerator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!     let settings = CompletionSettings::from_env(&config.completion)?;
//!
//!     let credential = auth::google_provider(
//!         &config.auth.credentials_path,
//!         &config.auth.token_path,
//!     )
//!     .obtain()
//!     .await?;
//!     let mailbox = GmailMailbox::new(auth::build_hub(&credential)?, "me");
//!     let generator = OpenAiReplyGenerator::new(&settings);
//!
//!     let options = pipeline::RunOptions { limit: 10, dry_run: false };
//!     pipeline::run(&mailbox, &generator, options, &mut std::io::stdout()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - Credential policy, token file, and Gmail hub construction
//! - [`cli`] - Command-line interface and command handlers
//! - [`compose`] - Reply drafts and MIME rendering
//! - [`config`] - Configuration management
//! - [`content`] - Subject, sender, and body extraction
//! - [`error`] - Error types and result aliases
//! - [`mailbox`] - Mailbox client trait and Gmail implementation
//! - [`pipeline`] - Per-message orchestration
//! - [`reply`] - Reply generation through a completion service

pub mod auth;
pub mod cli;
pub mod compose;
pub mod config;
pub mod content;
pub mod error;
pub mod mailbox;
pub mod pipeline;
pub mod reply;

// Re-export commonly used types for convenience
pub use error::{ReplyError, Result};

pub use auth::{Credential, CredentialProvider, TokenStore};
pub use compose::ReplyDraft;
pub use config::{CompletionSettings, Config};
pub use content::MessageContent;
pub use mailbox::{GmailMailbox, MailboxClient, MessageSummary};
pub use pipeline::{RunOptions, RunReport};
pub use reply::{OpenAiReplyGenerator, ReplyGenerator};
