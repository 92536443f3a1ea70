//! Delivery seam and the SMTP implementation of it.

use std::future::Future;
use std::time::Duration;

use lettre::transport::smtp::authentication::{Credentials, DEFAULT_MECHANISMS};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use outreach_shared::{MailCredentials, MailSettings, OutreachError, Result};

use crate::message::OutboundEmail;

const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Reply codes a server uses to turn a login down.
const AUTH_REJECTED: [u16; 3] = [530, 534, 535];

/// Something that can deliver an [`OutboundEmail`].
pub trait Outbox: Send + Sync {
    fn deliver(&self, email: &OutboundEmail) -> impl Future<Output = Result<()>> + Send;
}

/// Implicit-TLS SMTP session, authenticated once per batch.
///
/// Every message of a batch goes over the one connection opened by
/// [`SmtpOutbox::connect`]. The session is only re-opened (and the
/// login repeated) when the server has dropped it.
pub struct SmtpOutbox {
    host: String,
    port: u16,
    tls: Option<TlsParameters>,
    credentials: Credentials,
    session: Mutex<AsyncSmtpConnection>,
}

impl SmtpOutbox {
    /// Open the session and log in.
    ///
    /// A rejected login is reported as an authentication error;
    /// anything else as a mail error.
    #[instrument(skip_all, fields(host = %settings.smtp_host, port = settings.smtp_port))]
    pub async fn connect(settings: &MailSettings, credentials: &MailCredentials) -> Result<Self> {
        let tls = TlsParameters::new(settings.smtp_host.clone())
            .map_err(|e| OutreachError::Mail(format!("invalid SMTP host: {e}")))?;
        let outbox =
            Self::open(&settings.smtp_host, settings.smtp_port, Some(tls), credentials).await?;
        info!("connected to SMTP server");
        Ok(outbox)
    }

    async fn open(
        host: &str,
        port: u16,
        tls: Option<TlsParameters>,
        credentials: &MailCredentials,
    ) -> Result<Self> {
        let credentials = Credentials::new(credentials.user.clone(), credentials.password.clone());
        let session = login(host, port, tls.clone(), &credentials).await?;
        Ok(Self {
            host: host.to_string(),
            port,
            tls,
            credentials,
            session: Mutex::new(session),
        })
    }
}

async fn login(
    host: &str,
    port: u16,
    tls: Option<TlsParameters>,
    credentials: &Credentials,
) -> Result<AsyncSmtpConnection> {
    let mut session = AsyncSmtpConnection::connect_tokio1(
        (host, port),
        Some(SMTP_TIMEOUT),
        &ClientId::default(),
        tls,
        None,
    )
    .await
    .map_err(|e| OutreachError::Mail(format!("could not connect to {host}:{port}: {e}")))?;

    if let Err(e) = session.auth(DEFAULT_MECHANISMS, credentials).await {
        return Err(if e.is_permanent() {
            OutreachError::authentication(format!("SMTP login rejected by {host}: {e}"))
        } else {
            OutreachError::Mail(format!("SMTP login to {host} failed: {e}"))
        });
    }
    Ok(session)
}

fn is_auth_rejection(error: &lettre::transport::smtp::Error) -> bool {
    error
        .status()
        .is_some_and(|code| AUTH_REJECTED.contains(&u16::from(code)))
}

impl Outbox for SmtpOutbox {
    async fn deliver(&self, email: &OutboundEmail) -> Result<()> {
        let message = email.to_message()?;
        let mut session = self.session.lock().await;

        if session.has_broken() {
            warn!("SMTP session dropped, logging in again");
            *session = login(&self.host, self.port, self.tls.clone(), &self.credentials).await?;
        }

        let response = session
            .send(message.envelope(), &message.formatted())
            .await
            .map_err(|e| {
                if is_auth_rejection(&e) {
                    OutreachError::authentication(format!("SMTP server refused delivery: {e}"))
                } else {
                    OutreachError::Mail(format!("delivery to {} failed: {e}", email.to))
                }
            })?;
        debug!(to = %email.to, code = %response.code(), "message accepted");
        Ok(())
    }
}
