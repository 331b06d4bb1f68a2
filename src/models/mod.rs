mod metric;
mod validators;

pub use metric::*;
