//! PropMedia Models
//!
//! Photo sets, display helpers and image primitives.

pub mod media;
pub mod display;
pub mod image;

pub use media::*;
pub use display::*;
pub use self::image::*;
