//! Materializes a FastAPI + Postgres + Next.js starter stack into a directory.
//!
//! The pipeline is: [`config::resolve`] turns command line input into an immutable
//! [`config::Configuration`], then [`materialize::materialize`] walks the
//! [`blueprint::scaffold`] and writes each [`vfs::VirtualFile`] under the configured root,
//! reporting one [`materialize::WriteOutcome`] per file.

pub mod api;
pub mod blueprint;
pub mod config;
pub mod errors;
pub mod exit_codes;
pub mod filesystem;
pub mod materialize;
pub mod preview;
pub mod report;
pub mod template;
pub mod vfs;
