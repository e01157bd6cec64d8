use md5::{Digest, Md5};

/// Gravatar-style fingerprint: md5 of the trimmed, lowercased email.
/// Stored on the identity and recomputed whenever the email changes.
pub fn fingerprint(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    let digest = Md5::digest(normalized.as_bytes());
    hex::encode(digest)
}

/// Build an avatar URL from a stored fingerprint.
pub fn url(fingerprint: &str, size: u32) -> String {
    format!(
        "https://secure.gravatar.com/avatar/{}?s={}&d=identicon&r=g",
        fingerprint, size
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_case_insensitive() {
        assert_eq!(fingerprint("John@Example.COM"), fingerprint("john@example.com"));
    }

    #[test]
    fn fingerprint_matches_known_digest() {
        // md5("john@example.com")
        assert_eq!(fingerprint("john@example.com"), "d4c74594d841139328695756648b6bd6");
    }

    #[test]
    fn url_embeds_fingerprint_and_size() {
        let u = url("abc123", 100);
        assert!(u.contains("/avatar/abc123?"));
        assert!(u.contains("s=100"));
    }
}
