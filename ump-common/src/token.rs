//! Random identifiers for catalogue rows and permissions

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Length of a catalogue token (8 random bytes, unpadded URL-safe base64)
pub const TOKEN_LEN: usize = 11;

/// Generate a new catalogue token such as `"Yd3L0wq_9zA"`
pub fn make_token() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a long random secret (session tokens)
pub fn make_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
