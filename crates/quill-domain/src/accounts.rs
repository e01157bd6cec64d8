use chrono::Utc;
use uuid::Uuid;

use quill_auth::token::DEFAULT_TTL_SECS;
use quill_auth::{Permission, TokenPurpose, avatar, password, permission};
use quill_db::models::UserRow;
use quill_db::is_unique_violation;

use crate::mail::MailKind;
use crate::{Domain, DomainError, DomainResult};

impl Domain {
    /// Create an unconfirmed identity: default role (or the
    /// all-capabilities role when the email matches the configured
    /// admin address), avatar fingerprint, reflexive follow edge, and
    /// a confirmation mail. Duplicate email/username is decided by the
    /// UNIQUE constraint at insert time, not by any pre-check.
    pub fn register(&self, email: &str, username: &str, plaintext: &str) -> DomainResult<UserRow> {
        let email = email.trim();
        let username = username.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("a valid email is required"));
        }
        if username.is_empty() || username.len() > 64 {
            return Err(DomainError::validation("username must be 1-64 characters"));
        }
        if plaintext.is_empty() {
            return Err(DomainError::validation("password must not be empty"));
        }

        let role = if self.is_admin_email(email) {
            self.db.admin_role()?
        } else {
            self.db.default_role()?
        };

        let now = Utc::now();
        let user = UserRow {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: password::hash_password(plaintext)?,
            role_id: role.id,
            confirmed: false,
            name: None,
            location: None,
            about_me: None,
            member_since: now,
            last_seen: now,
            avatar_hash: avatar::fingerprint(email),
        };

        if let Err(e) = self.db.create_user(&user) {
            if is_unique_violation(&e) {
                let msg = if self.db.get_user_by_email(email)?.is_some() {
                    "email already registered"
                } else {
                    "username already in use"
                };
                return Err(DomainError::validation(msg));
            }
            return Err(e.into());
        }

        let token = self.issue_confirmation_token(&user)?;
        self.mailer
            .send(MailKind::ConfirmAccount, &user.email, &user.username, &token);

        Ok(user)
    }

    /// Credential check for login and HTTP Basic auth. All failure
    /// causes collapse to `InvalidCredentials`.
    pub fn authenticate(&self, email: &str, plaintext: &str) -> DomainResult<UserRow> {
        let user = self
            .db
            .get_user_by_email(email)?
            .ok_or(DomainError::InvalidCredentials)?;
        if !password::verify_password(&user.password_hash, plaintext) {
            return Err(DomainError::InvalidCredentials);
        }
        Ok(user)
    }

    pub fn issue_confirmation_token(&self, user: &UserRow) -> DomainResult<String> {
        let sub = parse_id(&user.id)?;
        Ok(self
            .tokens
            .issue(TokenPurpose::ConfirmAccount, sub, None, DEFAULT_TTL_SECS)?)
    }

    /// Flip `confirmed` on a valid token for this identity. Idempotent:
    /// confirming twice reports success. Any token problem, including a
    /// subject mismatch, reports failure and changes nothing.
    pub fn confirm(&self, user: &UserRow, token: &str) -> DomainResult<bool> {
        let Ok(claims) = self.tokens.verify(token, TokenPurpose::ConfirmAccount) else {
            return Ok(false);
        };
        if claims.sub.to_string() != user.id {
            return Ok(false);
        }
        if !user.confirmed {
            self.db.set_confirmed(&user.id)?;
        }
        Ok(true)
    }

    pub fn issue_reset_token(&self, user: &UserRow) -> DomainResult<String> {
        let sub = parse_id(&user.id)?;
        Ok(self
            .tokens
            .issue(TokenPurpose::ResetPassword, sub, None, DEFAULT_TTL_SECS)?)
    }

    /// "Forgot password" path: the token alone names the subject, no
    /// old password needed. Returns the affected user on success.
    pub fn reset_password(&self, token: &str, new_password: &str) -> DomainResult<Option<UserRow>> {
        if new_password.is_empty() {
            return Err(DomainError::validation("password must not be empty"));
        }
        let Ok(claims) = self.tokens.verify(token, TokenPurpose::ResetPassword) else {
            return Ok(None);
        };
        let Some(user) = self.db.get_user_by_id(&claims.sub.to_string())? else {
            return Ok(None);
        };
        let hash = password::hash_password(new_password)?;
        self.db.set_password_hash(&user.id, &hash)?;
        Ok(Some(user))
    }

    /// Authenticated path: requires the old password, no token.
    pub fn change_password(
        &self,
        user: &UserRow,
        old_password: &str,
        new_password: &str,
    ) -> DomainResult<()> {
        if !password::verify_password(&user.password_hash, old_password) {
            return Err(DomainError::InvalidCredentials);
        }
        if new_password.is_empty() {
            return Err(DomainError::validation("password must not be empty"));
        }
        let hash = password::hash_password(new_password)?;
        self.db.set_password_hash(&user.id, &hash)?;
        Ok(())
    }

    /// Start an email change: password re-check, advisory uniqueness
    /// check, then a token mailed to the new address. The authoritative
    /// uniqueness check happens again at apply time.
    pub fn request_email_change(
        &self,
        user: &UserRow,
        new_email: &str,
        plaintext: &str,
    ) -> DomainResult<String> {
        let new_email = new_email.trim();
        if new_email.is_empty() || !new_email.contains('@') {
            return Err(DomainError::validation("a valid email is required"));
        }
        if !password::verify_password(&user.password_hash, plaintext) {
            return Err(DomainError::InvalidCredentials);
        }
        if self.db.get_user_by_email(new_email)?.is_some() {
            return Err(DomainError::validation("email already registered"));
        }
        let sub = parse_id(&user.id)?;
        let token = self.tokens.issue(
            TokenPurpose::ChangeEmail,
            sub,
            Some(new_email.to_string()),
            DEFAULT_TTL_SECS,
        )?;
        self.mailer
            .send(MailKind::ChangeEmail, new_email, &user.username, &token);
        Ok(token)
    }

    /// Apply an email change. Fails (leaving the email unchanged) on a
    /// bad token, a subject mismatch, or when the target address was
    /// claimed by another identity after the token was issued — the
    /// write itself is constraint-checked.
    pub fn change_email(&self, user: &UserRow, token: &str) -> DomainResult<bool> {
        let Ok(claims) = self.tokens.verify(token, TokenPurpose::ChangeEmail) else {
            return Ok(false);
        };
        if claims.sub.to_string() != user.id {
            return Ok(false);
        }
        let Some(new_email) = claims.new_email else {
            return Ok(false);
        };
        let fingerprint = avatar::fingerprint(&new_email);
        Ok(self.db.change_email(&user.id, &new_email, &fingerprint)?)
    }

    /// Stateless API token. Any identity may mint one; the API layer
    /// separately keeps unconfirmed identities off protected routes.
    pub fn generate_auth_token(&self, user: &UserRow, ttl_secs: u64) -> DomainResult<String> {
        let sub = parse_id(&user.id)?;
        Ok(self.tokens.issue(TokenPurpose::ApiAuth, sub, None, ttl_secs)?)
    }

    /// Resolve an API token to its identity. Invalid or expired tokens
    /// and deleted identities all read as `None`.
    pub fn verify_auth_token(&self, token: &str) -> DomainResult<Option<UserRow>> {
        let Ok(claims) = self.tokens.verify(token, TokenPurpose::ApiAuth) else {
            return Ok(None);
        };
        Ok(self.db.get_user_by_id(&claims.sub.to_string())?)
    }

    /// Refresh `last_seen`; called on every authenticated request.
    pub fn ping(&self, user: &UserRow) -> DomainResult<()> {
        self.db.touch_last_seen(&user.id, Utc::now())?;
        Ok(())
    }

    /// Capability containment check against the identity's role. An
    /// identity whose role is missing satisfies nothing.
    pub fn user_can(&self, user: &UserRow, needed: Permission) -> DomainResult<bool> {
        let Some(role) = self.db.get_role(user.role_id)? else {
            return Ok(false);
        };
        Ok(permission::can(role.permissions, needed))
    }
}

fn parse_id(id: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(id).map_err(|e| DomainError::Internal(anyhow::anyhow!("bad user id: {}", e)))
}
