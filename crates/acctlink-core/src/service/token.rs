//! Session token and challenge code minting.

use acctlink_types::session::SessionToken;
use rand::Rng;

const TOKEN_PREFIX: &str = "lk_";
const TOKEN_BYTES: usize = 32;

/// Mint a fresh, unguessable session token.
///
/// 256 bits from the thread-local CSPRNG, hex encoded behind a short
/// recognizable prefix.
pub fn mint_session_token() -> SessionToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);

    let mut token = String::with_capacity(TOKEN_PREFIX.len() + TOKEN_BYTES * 2);
    token.push_str(TOKEN_PREFIX);
    for byte in bytes {
        token.push_str(&format!("{byte:02x}"));
    }
    SessionToken::new(token)
}

/// Mint a six-digit challenge code in `100000..=999999`.
pub fn mint_challenge_code() -> String {
    rand::rng().random_range(100_000..1_000_000u32).to_string()
}
