// Type definitions for the PDF structure analysis engine

pub mod object;

pub use object::*;
