use std::path::Path;

use relay_core::wire::FcmToken;

use crate::error::StoreError;

/// Write the single-token credential file older clients read
/// (`{"fcm":{"token":...}}`).
pub fn write_legacy_token(path: &Path, token: &str) -> Result<(), StoreError> {
    let json = serde_json::to_string(&FcmToken::new(token))?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), "Wrote legacy credential file");
    Ok(())
}
