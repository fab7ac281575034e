//! alpide-core: Pixel hit model for ALPIDE sensor readout data.
//!
//! This crate holds the pieces shared by the decoder and the output side:
//! the validated [`PixelHit`], its [`QualityFlag`], the caller supplied
//! [`TriggerTime`] and the sensor [`geometry`].

pub mod error;
pub mod geometry;
pub mod hit;

pub use error::{Error, Result};
pub use geometry::PixelCoord;
pub use hit::{Hit, PixelHit, QualityFlag, TriggerTime};
