// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) parses arguments and hands them to `ui::run`.
//
// Module responsibilities:
// - `api`: the blocking job client (session id, start, poll, account status).
// - `config`: explicit client settings and the command-line surface.
// - `error`: the error kinds the client can return.
// - `ui`: token/text resolution and console output around one job.
pub mod api;
pub mod config;
pub mod error;
pub mod ui;

pub use api::{HumanizeClient, JobHandle, JobRequest};
pub use config::{ClientConfig, PollSettings};
pub use error::{HumanizeError, Result};
