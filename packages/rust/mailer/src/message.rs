//! Outbound message assembly.

use std::path::Path;
use std::sync::Arc;

use lettre::Message;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use tracing::{debug, warn};

use outreach_shared::{OutreachError, Result};

/// A file attached to every message in a batch.
#[derive(Debug, Clone)]
pub struct AttachmentFile {
    pub filename: String,
    pub content_type: ContentType,
    pub content: Vec<u8>,
}

impl AttachmentFile {
    /// Read the attachment from disk.
    ///
    /// A missing file is not an error: the batch goes out without it.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "attachment not found, sending without it");
                return Ok(None);
            }
            Err(e) => return Err(OutreachError::io(path, e)),
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        debug!(%filename, bytes = content.len(), "loaded attachment");
        Ok(Some(Self {
            content_type: content_type_for(path)?,
            filename,
            content,
        }))
    }
}

fn content_type_for(path: &Path) -> Result<ContentType> {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    let mime = if is_pdf {
        "application/pdf"
    } else {
        "application/octet-stream"
    };
    ContentType::parse(mime).map_err(|e| OutreachError::Mail(format!("bad content type {mime}: {e}")))
}

/// `Name <address>`, quoted as needed for a `From` header.
pub fn sender_mailbox(name: &str, address: &str) -> Result<String> {
    let address = address
        .trim()
        .parse()
        .map_err(|e| OutreachError::Mail(format!("invalid sender address '{address}': {e}")))?;
    let name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
    Ok(Mailbox::new(name, address).to_string())
}

/// One message ready to hand to an [`Outbox`](crate::Outbox).
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Arc<AttachmentFile>>,
}

impl OutboundEmail {
    /// Build a `multipart/mixed` message: plain-text body plus the attachment.
    pub fn to_message(&self) -> Result<Message> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| OutreachError::Mail(format!("invalid sender '{}': {e}", self.from)))?;
        let to: Mailbox = self
            .to
            .parse()
            .map_err(|e| OutreachError::Mail(format!("invalid recipient '{}': {e}", self.to)))?;

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(self.body.clone()));
        if let Some(file) = &self.attachment {
            parts = parts.singlepart(
                Attachment::new(file.filename.clone())
                    .body(file.content.clone(), file.content_type.clone()),
            );
        }

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .multipart(parts)
            .map_err(|e| OutreachError::Mail(format!("failed to build message: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(attachment: Option<Arc<AttachmentFile>>) -> OutboundEmail {
        OutboundEmail {
            from: "Ada Lovelace <ada@example.com>".into(),
            to: "hello@acme.io".into(),
            subject: "Exploring Career Opportunities with Acme".into(),
            body: "Hello Acme".into(),
            attachment,
        }
    }

    #[test]
    fn missing_attachment_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AttachmentFile::load(&dir.path().join("resume.pdf")).unwrap().is_none());
    }

    #[test]
    fn pdf_attachment_gets_pdf_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.PDF");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let file = AttachmentFile::load(&path).unwrap().unwrap();
        assert_eq!(file.filename, "resume.PDF");
        assert_eq!(file.content_type, ContentType::parse("application/pdf").unwrap());
        assert_eq!(file.content, b"%PDF-1.4");
    }

    #[test]
    fn other_attachments_are_octet_streams() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.docx");
        std::fs::write(&path, b"doc").unwrap();

        let file = AttachmentFile::load(&path).unwrap().unwrap();
        assert_eq!(
            file.content_type,
            ContentType::parse("application/octet-stream").unwrap()
        );
    }

    #[test]
    fn message_is_multipart_with_attachment() {
        let file = AttachmentFile {
            filename: "resume.pdf".into(),
            content_type: ContentType::parse("application/pdf").unwrap(),
            content: b"%PDF-1.4".to_vec(),
        };
        let message = email(Some(Arc::new(file))).to_message().unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("To: hello@acme.io"));
        assert!(raw.contains("Subject: Exploring Career Opportunities with Acme"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("resume.pdf"));
    }

    #[test]
    fn message_without_attachment_has_only_body() {
        let raw = String::from_utf8(email(None).to_message().unwrap().formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("Hello Acme"));
        assert!(!raw.contains("Content-Disposition: attachment"));
    }

    #[test]
    fn sender_mailbox_round_trips() {
        let from = sender_mailbox("Ada, Countess", "ada@example.com").unwrap();
        let parsed: Mailbox = from.parse().unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Ada, Countess"));
        assert_eq!(parsed.email.to_string(), "ada@example.com");

        assert_eq!(sender_mailbox("", "ada@example.com").unwrap(), "ada@example.com");
        assert!(sender_mailbox("Ada", "not-an-address").is_err());
    }

    #[test]
    fn bad_recipient_is_a_mail_error() {
        let mut bad = email(None);
        bad.to = "N/A".into();
        assert!(matches!(bad.to_message(), Err(OutreachError::Mail(_))));
    }
}
