//! Adapters for the external push-service collaborators.
//!
//! The push protocol itself lives in helper programs; these adapters only
//! speak JSON with them over stdio.

pub mod command;
pub mod mock;

pub use command::{CommandListener, CommandRegistrar, CommandSpec};
pub use mock::{MockListener, MockRegistrar};
