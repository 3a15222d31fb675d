pub mod webhook_handler;

pub use webhook_handler::{configure, BodyLimit, DEFAULT_MAX_BODY_BYTES};
