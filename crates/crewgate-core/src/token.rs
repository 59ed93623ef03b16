//! Invitation token generation and join links.

use rand_core::{OsRng, RngCore};

pub const TOKEN_PREFIX: &str = "inv_";

/// 256 bits from the OS RNG, hex-encoded behind a recognizable prefix.
pub fn generate_token() -> String {
    let mut secret = [0u8; 32];
    OsRng.fill_bytes(&mut secret);
    format!("{}{}", TOKEN_PREFIX, hex::encode(secret))
}

/// Embed a token in a join link as the `token` query parameter.
///
/// Tokens are `inv_` plus hex, so they need no percent-encoding.
pub fn join_link(base_url: &str, token: &str) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", base_url, separator, token)
}
