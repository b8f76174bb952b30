//! The derived ("study") side: anonymized aggregate recomputation,
//! report reads, and the spreadsheet export artifact.

pub mod aggregation;
pub mod export;
pub mod reports;

pub use aggregation::*;
pub use export::*;
pub use reports::*;
