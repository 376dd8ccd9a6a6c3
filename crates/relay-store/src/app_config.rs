use std::path::Path;

use relay_core::device::AppConfig;
use relay_core::RelayError;

/// Read the push service application config (`config.json`).
///
/// Failure here is fatal: without app data there is nothing to register
/// or listen with.
pub fn load_app_config(path: &Path) -> Result<AppConfig, RelayError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RelayError::Config(format!("could not read {}: {e}", path.display())))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| RelayError::Config(format!("could not parse {}: {e}", path.display())))?;
    if !value.is_object() {
        return Err(RelayError::Config(format!(
            "{} must contain a JSON object",
            path.display()
        )));
    }
    Ok(AppConfig(value))
}
