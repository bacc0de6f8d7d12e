pub mod error;
pub mod transcoder;
