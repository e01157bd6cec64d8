pub mod accounts;
pub mod content;
pub mod error;
pub mod graph;
pub mod mail;
pub mod seed;

use std::sync::Arc;

use quill_auth::TokenCodec;
use quill_db::Database;

use crate::mail::Mailer;

pub use crate::error::{DomainError, DomainResult};

/// Application context, built once at startup and passed to every
/// component that needs it. No ambient globals.
pub struct Domain {
    pub db: Arc<Database>,
    pub tokens: TokenCodec,
    pub mailer: Mailer,
    admin_email: Option<String>,
}

impl Domain {
    pub fn new(
        db: Arc<Database>,
        tokens: TokenCodec,
        mailer: Mailer,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            db,
            tokens,
            mailer,
            admin_email,
        }
    }

    pub(crate) fn is_admin_email(&self, email: &str) -> bool {
        self.admin_email.as_deref() == Some(email)
    }
}
