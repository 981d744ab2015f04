//! Domain models for transfer scan verification

mod scan;
mod transfer;

pub use scan::*;
pub use transfer::*;
