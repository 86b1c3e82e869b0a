//! Image transformation operators
//!
//! Every operator is a synchronous function from a [`crate::PixelGrid`] (plus
//! validated parameters) to a new grid of the same height and width. Inputs
//! are never mutated. Randomized effects take an explicit RNG.

pub mod ascii;
pub mod learned;
pub mod segmentation;
pub mod spatial;
pub mod stylize;
pub mod tone;

pub use segmentation::{GrabCut, GrabCutConfig};
