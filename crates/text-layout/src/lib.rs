//! PromoReel Text Layout
//!
//! Pure computation, no I/O:
//! - **Wrapping:** fits caption lines into a pixel budget using an average
//!   glyph width heuristic instead of real font metrics
//! - **Classification:** picks size and weight per source line
//!
//! Classification happens before wrapping, so emphasized lines wrap against
//! the budget computed with their larger point size.

pub mod classify;
pub mod wrap;

pub use classify::*;
pub use wrap::*;
