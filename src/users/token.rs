use rand::{rngs::OsRng, RngCore};

/// Single-use activation token: 8 random bytes, hex encoded.
pub fn activation_token() -> String {
    let mut buf = [0u8; 8];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}
