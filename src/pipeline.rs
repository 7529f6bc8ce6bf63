//! Read, generate, and draft: one message at a time

use std::io::Write;
use tracing::{debug, info};

use crate::compose::{create_draft, ReplyDraft};
use crate::error::Result;
use crate::mailbox::{fetch_content, list_recent, MailboxClient};
use crate::reply::ReplyGenerator;

/// Options for one run
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Maximum number of messages to process
    pub limit: u32,
    /// Generate replies but do not save drafts
    pub dry_run: bool,
}

/// Counts from a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub messages_processed: usize,
    pub drafts_created: usize,
}

/// Run the pipeline, writing progress lines to `out`
///
/// Messages are handled strictly in sequence. The first failure ends the run;
/// drafts already created stay in the mailbox.
pub async fn run<M, G, W>(
    mailbox: &M,
    generator: &G,
    options: RunOptions,
    out: &mut W,
) -> Result<RunReport>
where
    M: MailboxClient + ?Sized,
    G: ReplyGenerator + ?Sized,
    W: Write + Send,
{
    let messages = list_recent(mailbox, options.limit).await?;
    info!("Found {} messages to process", messages.len());

    let mut report = RunReport::default();

    for summary in messages {
        let content = fetch_content(mailbox, &summary.id).await?;
        writeln!(
            out,
            "Processing email: {} from {}",
            content.subject, content.sender
        )?;

        let reply = generator
            .generate(&content.subject, &content.sender, &content.body_text)
            .await?;
        let draft = ReplyDraft::for_message(&content, &reply);
        report.messages_processed += 1;

        if options.dry_run {
            writeln!(
                out,
                "Dry run: draft to {} with subject {} not saved.",
                draft.recipient, draft.subject
            )?;
            continue;
        }

        let draft_id = create_draft(mailbox, &draft).await?;
        debug!("Message {} answered by draft {}", summary.id, draft_id);
        writeln!(out, "Draft created.")?;
        report.drafts_created += 1;
    }

    info!(
        "Processed {} messages, created {} drafts",
        report.messages_processed, report.drafts_created
    );
    Ok(report)
}
