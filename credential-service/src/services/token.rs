//! Single-use token issuance.

use rand::rngs::OsRng;
use rand::RngCore;

/// 256 bits of entropy per token.
const TOKEN_BYTES: usize = 32;

/// Length of an issued token in hex characters.
pub const TOKEN_HEX_LEN: usize = TOKEN_BYTES * 2;

/// Issue an unguessable token for invitations and password resets.
///
/// Draws from the operating system RNG; the only failure mode is the
/// randomness source itself being unavailable, which is fatal and not
/// retried.
pub fn issue_token() -> Result<String, anyhow::Error> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| anyhow::anyhow!("Secure randomness source unavailable: {}", e))?;
    Ok(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_64_hex_chars() {
        let token = issue_token().expect("Failed to issue token");
        assert_eq!(token.len(), TOKEN_HEX_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = issue_token().expect("Failed to issue token");
        let b = issue_token().expect("Failed to issue token");
        assert_ne!(a, b);
    }
}
