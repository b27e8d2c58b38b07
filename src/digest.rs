//! Content digests over raw form definition bytes.
//! The digest doubles as a version fingerprint and as the integrity token
//! clients receive in the formList (there with an `md5:` prefix). It is
//! byte-for-byte sensitive: any whitespace or encoding change yields a new
//! fingerprint.

/// Lowercase hex md5 digest of the raw bytes.
pub fn content_hash(raw: &[u8]) -> String {
    format!("{:x}", md5::compute(raw))
}
