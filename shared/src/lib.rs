//! Shared types and domain core for lot scan verification
//!
//! This crate holds everything that does not touch storage: identifier
//! normalization, the transfer/line model, the per-identifier scan state
//! machine, expected-set computation, finalize checks and package
//! resequencing plans. The backend and the WASM module both build on it.

pub mod expected;
pub mod finalize;
pub mod models;
pub mod reconcile;
pub mod sequence;
pub mod types;
pub mod validation;

pub use expected::*;
pub use finalize::*;
pub use models::*;
pub use reconcile::*;
pub use sequence::*;
pub use types::*;
pub use validation::*;
