//! PromoReel Composition Model
//!
//! Defines the data contracts for a composition run:
//! - **Clips:** Sub-range extractions of a source file
//! - **Captions:** Text blocks with a vertical anchor and a visibility window
//! - **Filters:** Ordered filter nodes consumed by the external encoder
//! - **Composition:** Every input/output path and setting for one run
//!
//! Times are expressed in seconds; pixel positions are relative to the
//! padded output canvas.

pub mod caption;
pub mod clip;
pub mod composition;
pub mod filter;

pub use caption::*;
pub use clip::*;
pub use composition::*;
pub use filter::*;
