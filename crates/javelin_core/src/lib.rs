//! javelin_core: Shared primitives for the Javelin front-end.
//!
//! Source positions and ranges used by tokens, trivia, and diagnostics.

pub mod text;

pub use text::{LineColumn, TextPos, TextRange};
