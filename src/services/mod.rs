//! Service layer: the codec boundary and output format selection
//!
//! These services keep container handling out of the operators, which only
//! ever see [`crate::PixelGrid`] values.

pub mod format;
pub mod io;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
