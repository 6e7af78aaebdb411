//! Host collaborators for the Tether console.
//!
//! The console itself only evaluates; this crate provides what the
//! evaluated code can drive on the host: spawning test images with a
//! capability table ([`process`]), the test orchestration built on it
//! ([`runner`]), the allocation tracker's command channel
//! ([`alloc_track`]) and recursive deletion ([`rmtree`]).
//! [`bindings::install`] exposes them as console builtins.

pub mod alloc_track;
pub mod bindings;
mod config;
mod error;
pub mod paths;
pub mod process;
pub mod rmtree;
pub mod runner;

pub use config::HostConfig;
pub use error::{HostError, HostResult};
