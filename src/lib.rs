// ABOUTME: Root module for undertow - background agent scheduling for coding-agent hosts.
// ABOUTME: Re-exports the limiter, task registry, manager, personas, config, and state store.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod manager;
pub mod persona;
pub mod prelude;
pub mod state;
pub mod task;

pub use error::UndertowError;
