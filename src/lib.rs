//! Single-job media transcode worker.
//!
//! Downloads one object, transcodes it with ffmpeg straight into the output
//! bucket, reports progress over JSON-RPC while it runs and records the
//! terminal status of the job.

pub mod app;
pub mod common;
pub mod config;
pub mod docs;
pub mod infrastructure;
pub mod modules;
pub mod routes;
pub mod state;
pub mod workers;
