//! PropMedia HTTP Handlers

pub mod media;

pub use media::{MediaHandler, ServeError};
