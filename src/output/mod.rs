// Output module
pub mod table;

pub use table::{AnomalyListing, OptimizationListing, OutputFormat, format_currency};
