use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default lifetime for account-flow tokens.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// What a token authorizes. A token minted for one purpose never
/// verifies under another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    ConfirmAccount,
    ResetPassword,
    ChangeEmail,
    ApiAuth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub purpose: TokenPurpose,
    pub sub: Uuid,
    /// Only present on `ChangeEmail` tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_email: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// All verification failures collapse to this one error so callers
/// cannot tell (and cannot leak) whether a token was tampered with,
/// malformed, or merely expired.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid token")]
pub struct InvalidToken;

/// Signs and verifies purpose-tagged, expiring tokens with a
/// process-wide secret. Stateless: no database round-trip needed to
/// detect tampering or expiry.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Zero leeway: a 1-second TTL must be expired 2 seconds later.
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(
        &self,
        purpose: TokenPurpose,
        subject: Uuid,
        new_email: Option<String>,
        ttl_secs: u64,
    ) -> anyhow::Result<String> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            purpose,
            sub: subject,
            new_email,
            iat: now,
            exp: now + ttl_secs as i64,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify signature, expiry, and purpose. Callers must additionally
    /// check that `claims.sub` matches the identity acting on the token.
    pub fn verify(
        &self,
        token: &str,
        expected: TokenPurpose,
    ) -> Result<TokenClaims, InvalidToken> {
        let data =
            decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|_| InvalidToken)?;
        if data.claims.purpose != expected {
            return Err(InvalidToken);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("unit-test-secret")
    }

    #[test]
    fn roundtrip_all_purposes() {
        let codec = codec();
        let subject = Uuid::new_v4();
        for purpose in [
            TokenPurpose::ConfirmAccount,
            TokenPurpose::ResetPassword,
            TokenPurpose::ChangeEmail,
            TokenPurpose::ApiAuth,
        ] {
            let token = codec.issue(purpose, subject, None, 60).unwrap();
            let claims = codec.verify(&token, purpose).unwrap();
            assert_eq!(claims.sub, subject);
        }
    }

    #[test]
    fn purpose_mismatch_fails() {
        let codec = codec();
        let token = codec
            .issue(TokenPurpose::ConfirmAccount, Uuid::new_v4(), None, 60)
            .unwrap();
        assert_eq!(
            codec.verify(&token, TokenPurpose::ResetPassword),
            Err(InvalidToken)
        );
    }

    #[test]
    fn wrong_secret_fails() {
        let token = codec()
            .issue(TokenPurpose::ApiAuth, Uuid::new_v4(), None, 60)
            .unwrap();
        let other = TokenCodec::new("a-different-secret");
        assert_eq!(other.verify(&token, TokenPurpose::ApiAuth), Err(InvalidToken));
    }

    #[test]
    fn garbage_fails() {
        assert_eq!(
            codec().verify("not.a.token", TokenPurpose::ApiAuth),
            Err(InvalidToken)
        );
    }

    #[test]
    fn expiry_is_exact() {
        let codec = codec();
        let token = codec
            .issue(TokenPurpose::ConfirmAccount, Uuid::new_v4(), None, 1)
            .unwrap();
        assert!(codec.verify(&token, TokenPurpose::ConfirmAccount).is_ok());
        std::thread::sleep(std::time::Duration::from_secs(2));
        assert_eq!(
            codec.verify(&token, TokenPurpose::ConfirmAccount),
            Err(InvalidToken)
        );
    }

    #[test]
    fn change_email_carries_payload() {
        let codec = codec();
        let token = codec
            .issue(
                TokenPurpose::ChangeEmail,
                Uuid::new_v4(),
                Some("new@example.com".into()),
                60,
            )
            .unwrap();
        let claims = codec.verify(&token, TokenPurpose::ChangeEmail).unwrap();
        assert_eq!(claims.new_email.as_deref(), Some("new@example.com"));
    }
}
