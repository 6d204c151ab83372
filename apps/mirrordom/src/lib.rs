//! Live document mirroring: a producer streams snapshots and diffs of a page
//! and its frames, a [`session::Session`] logs them per frame, and viewers
//! poll for everything since the last change id they saw.

pub mod cli;
pub mod config;
pub mod mirror;
pub mod model;
pub mod protocol;
pub mod session;
pub mod telemetry;

pub use mirror_markup as markup;
