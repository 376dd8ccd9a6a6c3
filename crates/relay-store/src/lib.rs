pub mod app_config;
pub mod credentials;
pub mod error;
pub mod legacy;

pub use app_config::load_app_config;
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::StoreError;
pub use legacy::write_legacy_token;
