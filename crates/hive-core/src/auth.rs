//! Registry authentication tokens
//!
//! The coordinator generates a random token when it starts the registry
//! and embeds it in every worker's startup spec. Workers present it in
//! the `Hello` frame; the server validates with a constant-time compare.
//!
//! The token is 32 bytes of cryptographically random data, hex-encoded
//! (64 chars), regenerated on every run. It never touches the
//! filesystem.

/// Length of the authentication token in bytes (before hex encoding)
const TOKEN_BYTES: usize = 32;

/// Generate a new random authentication token
///
/// Returns a 64-character hex string (32 random bytes)
pub fn generate_token() -> String {
    use rand::Rng;
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Validate a token against the expected token
///
/// Returns true if the provided token matches the expected token.
/// Uses constant-time comparison to prevent timing attacks.
pub fn validate_token(provided: &str, expected: &str) -> bool {
    if provided.len() != expected.len() {
        return false;
    }

    let mut result = 0u8;
    for (a, b) in provided.bytes().zip(expected.bytes()) {
        result |= a ^ b;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_BYTES * 2); // Hex encoding doubles length
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_token_unique() {
        let token1 = generate_token();
        let token2 = generate_token();
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_validate_token() {
        let token = "abc123def456";
        assert!(validate_token(token, token));
        assert!(!validate_token(token, "different"));
        assert!(!validate_token(token, "abc123def45")); // Different length
    }
}
