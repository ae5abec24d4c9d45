//! Utility functions for ids and uploaded file names.

use mongodb::bson::Uuid;
use rand::Rng;

/// Generate a new opaque identifier.
#[must_use]
pub fn new_id() -> String {
    Uuid::new().to_string()
}

/// Hex encoding of `len` random bytes.
#[must_use]
pub fn random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

/// Last path component of a client supplied file name.
///
/// Browsers may send either separator, so both are stripped.
#[must_use]
pub fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
}

/// Extension of a file name including the leading dot, or an empty string.
///
/// Leading dots belong to the name, so `.bashrc` has no extension.
#[must_use]
pub fn extension(file_name: &str) -> &str {
    let name = base_name(file_name);
    let stem_start = name.len() - name.trim_start_matches('.').len();
    name[stem_start..]
        .rfind('.')
        .map_or("", |i| &name[stem_start + i..])
}
