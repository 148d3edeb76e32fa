use tracing::error;

/// Hash a plaintext password with bcrypt at the given cost. The result is
/// self-describing (salt and cost are embedded), so verification needs only
/// the stored hash and the candidate plaintext.
pub fn hash_password(plain: &str, cost: u32) -> anyhow::Result<String> {
    bcrypt::hash(plain, cost).map_err(|e| {
        error!(error = %e, "bcrypt hash error");
        anyhow::anyhow!(e)
    })
}

/// Check a candidate plaintext against a stored hash. `Ok(false)` means a
/// mismatch; `Err` means the stored hash itself could not be parsed.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    bcrypt::verify(plain, hash).map_err(|e| {
        error!(error = %e, "bcrypt verify error");
        anyhow::anyhow!(e)
    })
}
