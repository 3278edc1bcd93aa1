use argon2::password_hash::rand_core::{OsRng, RngCore};

/// Every issued key starts with this marker.
pub const KEY_MARKER: &str = "dsk_";
const PREFIX_BYTES: usize = 4;
const SECRET_BYTES: usize = 16;

/// A freshly generated key: the display-safe prefix and the full plaintext.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub prefix: String,
    pub plaintext: String,
}

/// `dsk_<8 hex>.<32 hex>`. The part before the dot is the lookup prefix.
pub fn generate() -> GeneratedKey {
    let prefix = format!("{KEY_MARKER}{}", random_hex(PREFIX_BYTES));
    let plaintext = format!("{prefix}.{}", random_hex(SECRET_BYTES));
    GeneratedKey { prefix, plaintext }
}

/// The lookup prefix of a presented key, if it is shaped like one of ours.
pub fn prefix_of(plaintext: &str) -> Option<&str> {
    let (prefix, secret) = plaintext.split_once('.')?;
    let hex = prefix.strip_prefix(KEY_MARKER)?;
    let well_formed = hex.len() == PREFIX_BYTES * 2
        && secret.len() == SECRET_BYTES * 2
        && hex.chars().chain(secret.chars()).all(|c| c.is_ascii_hexdigit());
    well_formed.then_some(prefix)
}

pub fn mask(prefix: &str) -> String {
    format!("{prefix}.{}", "*".repeat(SECRET_BYTES))
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}
