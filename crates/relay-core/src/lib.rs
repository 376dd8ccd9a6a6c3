pub mod device;
pub mod errors;
pub mod events;
pub mod ids;
pub mod upstream;
pub mod wire;

pub use errors::{RelayError, UpstreamError};
pub use events::{NotificationEvent, PersistentId};
pub use ids::SubscriberId;
