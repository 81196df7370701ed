/// Computes the 64-bit content fingerprint of a fuzz input.
///
/// The fingerprint is the first eight bytes of the input's MD5 digest,
/// interpreted big-endian. It is used purely for deduplication-by-filename,
/// so it only has to be stable for identical contents within one run; it
/// carries no cryptographic-integrity guarantee.
pub fn content_fingerprint(data: &[u8]) -> u64 {
    let digest = md5::compute(data);
    u64::from_be_bytes([
        digest.0[0],
        digest.0[1],
        digest.0[2],
        digest.0[3],
        digest.0[4],
        digest.0[5],
        digest.0[6],
        digest.0[7],
    ])
}

/// Renders a fingerprint as 16 lowercase, zero-padded hex characters.
pub fn fingerprint_hex(fingerprint: u64) -> String {
    format!("{fingerprint:016x}")
}
