//! Templated outreach email: message building and SMTP delivery.

mod message;
mod template;
mod transport;

pub use message::{AttachmentFile, OutboundEmail, sender_mailbox};
pub use template::{OutreachTemplate, RenderedEmail};
pub use transport::{Outbox, SmtpOutbox};
