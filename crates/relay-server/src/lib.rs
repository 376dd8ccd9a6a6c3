pub mod bootstrap;
mod buffer;
pub mod client;
pub mod config;
pub mod hub;
mod ledger;
mod pipeline;
pub mod registry;
pub mod server;
pub mod upstream;

pub use bootstrap::{ListenerLauncher, ListenerState};
pub use config::ServerConfig;
pub use hub::{spawn_hub, HubHandle, HubStats};
pub use server::{start, ServerHandle};
pub use upstream::{UpstreamLauncher, UpstreamParts};
