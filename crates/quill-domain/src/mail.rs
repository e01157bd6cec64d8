use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{info, warn};

/// What kind of notification a message is; selects the template.
#[derive(Debug, Clone, Copy)]
pub enum MailKind {
    ConfirmAccount,
    ResetPassword,
    ChangeEmail,
}

#[derive(Debug, Clone)]
pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery backend. The real transport is a deployment concern; the
/// default just logs, tests record.
pub trait MailTransport: Send + Sync {
    fn deliver(&self, mail: &OutboundMail) -> anyhow::Result<()>;
}

pub struct LogTransport;

impl MailTransport for LogTransport {
    fn deliver(&self, mail: &OutboundMail) -> anyhow::Result<()> {
        info!(to = %mail.to, subject = %mail.subject, "outbound mail");
        Ok(())
    }
}

/// Captures every message instead of sending it. Used by tests.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<OutboundMail>>,
}

impl MailTransport for RecordingTransport {
    fn deliver(&self, mail: &OutboundMail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// Fire-and-forget mail dispatch through a bounded queue and a single
/// worker task. Each queued message is fully owned, so the request
/// that enqueued it can finish before delivery happens. There is no
/// retry; a failed or dropped send is logged and lost.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::Sender<OutboundMail>,
}

impl Mailer {
    /// Spawns the worker. Must be called from within a tokio runtime.
    pub fn start(transport: Arc<dyn MailTransport>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<OutboundMail>(capacity);
        tokio::spawn(async move {
            while let Some(mail) = rx.recv().await {
                if let Err(e) = transport.deliver(&mail) {
                    warn!(to = %mail.to, "mail delivery failed: {}", e);
                }
            }
        });
        Self { tx }
    }

    /// Enqueue and return immediately. A full queue drops the message
    /// rather than blocking the request path.
    pub fn send(&self, kind: MailKind, to: &str, username: &str, token: &str) {
        let mail = compose(kind, to, username, token);
        if self.tx.try_send(mail).is_err() {
            warn!(to = %to, "mail queue full, dropping message");
        }
    }
}

fn compose(kind: MailKind, to: &str, username: &str, token: &str) -> OutboundMail {
    let (subject, action, path) = match kind {
        MailKind::ConfirmAccount => (
            "[Quill] Confirm Your Account",
            "confirm your account",
            "confirm",
        ),
        MailKind::ResetPassword => (
            "[Quill] Reset Your Password",
            "reset your password",
            "reset",
        ),
        MailKind::ChangeEmail => (
            "[Quill] Confirm Your Email Address",
            "confirm your new email address",
            "change_email",
        ),
    };
    OutboundMail {
        to: to.to_string(),
        subject: subject.to_string(),
        body: format!(
            "Dear {username},\n\n\
             To {action}, submit the following token to /api/v1/account/{path}:\n\n\
             {token}\n\n\
             The token expires in one hour. If you did not request this, you can\n\
             ignore this message.\n",
        ),
    }
}
