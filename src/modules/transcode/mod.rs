pub mod cleanup;
pub mod command;
pub mod drain;
pub mod error;
pub mod model;
pub mod probe;
pub mod progress;
