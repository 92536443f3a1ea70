//! Send stage: one batch of `unsent` ledger rows → templated emails.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use outreach_ledger::Ledger;
use outreach_mailer::{
    AttachmentFile, OutboundEmail, Outbox, OutreachTemplate, SmtpOutbox, sender_mailbox,
};
use outreach_shared::{MailCredentials, MailSettings, RecordStatus, Result};

use crate::progress::ProgressReporter;

/// Result of one send batch.
#[derive(Debug, Default)]
pub struct SendReport {
    /// Rows picked for this batch.
    pub batch: usize,
    pub sent: usize,
    pub failed: usize,
    /// Rows without a usable address, now `no_email_found`.
    pub skipped: usize,
    /// `unsent` rows left for later runs.
    pub remaining: usize,
    /// Whether the batch went out with the attachment.
    pub attached: bool,
    pub ledger_path: PathBuf,
    pub elapsed: Duration,
}

/// Per-batch message inputs shared by every row.
pub struct BatchContext<'a> {
    /// Formatted `From` mailbox.
    pub from: String,
    pub template: OutreachTemplate,
    pub attachment: Option<Arc<AttachmentFile>>,
    pub delay: Duration,
    pub batch_size: usize,
    pub progress: &'a dyn ProgressReporter,
}

/// Send the next batch over SMTP and record the outcome in the ledger.
///
/// An empty batch returns before any connection is made. A rejected login
/// aborts the run with the ledger untouched.
pub async fn run_send(
    settings: &MailSettings,
    credentials: &MailCredentials,
    progress: &dyn ProgressReporter,
) -> Result<SendReport> {
    run_send_with(
        settings,
        &credentials.user,
        SmtpOutbox::connect(settings, credentials),
        progress,
    )
    .await
}

/// [`run_send`] with a caller-supplied connection step.
///
/// `connect` is only awaited once the ledger holds at least one `unsent`
/// row; `sender` is the address placed in the `From` header.
#[instrument(skip_all, fields(ledger = %settings.ledger_path.display()))]
pub async fn run_send_with<O, C>(
    settings: &MailSettings,
    sender: &str,
    connect: C,
    progress: &dyn ProgressReporter,
) -> Result<SendReport>
where
    O: Outbox,
    C: Future<Output = Result<O>>,
{
    let start = Instant::now();

    progress.phase("Loading ledger");
    let mut ledger = Ledger::open(&settings.ledger_path)?;

    let pending = ledger.unsent_batch(settings.batch_size).len();
    if pending == 0 {
        info!("no companies with 'unsent' status");
        progress.finish("Nothing to send");
        return Ok(SendReport {
            ledger_path: settings.ledger_path.clone(),
            elapsed: start.elapsed(),
            ..SendReport::default()
        });
    }
    info!(pending, "found emails to send in this batch");

    let attachment = AttachmentFile::load(&settings.attachment_path)?.map(Arc::new);

    progress.phase("Connecting to SMTP server");
    let outbox = connect.await?;

    let ctx = BatchContext {
        from: sender_mailbox(&settings.sender_name, sender)?,
        template: OutreachTemplate::from(settings),
        attachment,
        delay: settings.delay,
        batch_size: settings.batch_size,
        progress,
    };

    let mut report = send_batch(&mut ledger, &outbox, &ctx).await?;
    report.elapsed = start.elapsed();
    Ok(report)
}

/// Deliver up to `ctx.batch_size` `unsent` rows through `outbox`, update
/// their statuses and save the ledger.
///
/// Rows without a usable address are marked `no_email_found` without a
/// delivery attempt. Consecutive attempts are at least `ctx.delay` apart.
/// A rejected login stops the batch: statuses recorded so far are saved and
/// the authentication error is returned.
pub async fn send_batch<O: Outbox>(
    ledger: &mut Ledger,
    outbox: &O,
    ctx: &BatchContext<'_>,
) -> Result<SendReport> {
    let start = Instant::now();
    let batch = ledger.unsent_batch(ctx.batch_size);
    let total = batch.len();

    let mut report = SendReport {
        batch: total,
        attached: ctx.attachment.is_some(),
        ledger_path: ledger.path().to_path_buf(),
        ..SendReport::default()
    };

    ctx.progress.phase("Sending emails");
    let mut attempted = false;
    for (i, record) in batch.iter().enumerate() {
        ctx.progress.item(&record.company, i + 1, total);

        let Some(recipient) = record.primary_email() else {
            warn!(company = %record.company, "skipped: invalid or missing email address");
            ledger.set_status(&record.website, RecordStatus::NoEmailFound)?;
            report.skipped += 1;
            continue;
        };

        if attempted {
            tokio::time::sleep(ctx.delay).await;
        }
        attempted = true;

        let rendered = ctx.template.render(&record.company);
        let email = OutboundEmail {
            from: ctx.from.clone(),
            to: recipient.to_string(),
            subject: rendered.subject,
            body: rendered.body,
            attachment: ctx.attachment.clone(),
        };

        info!(company = %record.company, to = %recipient, "sending");
        let status = match outbox.deliver(&email).await {
            Ok(()) => {
                info!(company = %record.company, "sent");
                report.sent += 1;
                RecordStatus::Sent
            }
            Err(e) if e.is_authentication() => {
                warn!(company = %record.company, error = %e, "SMTP login rejected, stopping batch");
                ledger.save()?;
                return Err(e);
            }
            Err(e) => {
                warn!(company = %record.company, error = %e, "could not send");
                report.failed += 1;
                RecordStatus::Failed
            }
        };
        ledger.set_status(&record.website, status)?;
    }

    ledger.save()?;
    report.remaining = ledger.unsent_batch(usize::MAX).len();
    report.elapsed = start.elapsed();

    info!(
        sent = report.sent,
        failed = report.failed,
        skipped = report.skipped,
        remaining = report.remaining,
        "batch complete"
    );
    ctx.progress
        .finish(&format!("Sent {} of {} emails", report.sent, report.batch));

    Ok(report)
}
