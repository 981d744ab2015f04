//! HTTP handlers

pub mod health;
pub mod ledger;
pub mod lines;
pub mod packages;
pub mod scan;
pub mod transfers;

pub use health::health_check;
pub use ledger::{get_ledger, resync_ledger};
pub use lines::{create_line, delete_line, list_lines, update_line};
pub use packages::resequence_package;
pub use scan::{scan_batch, scan_lot};
pub use transfers::{cancel_transfer, create_transfer, finalize_transfer, get_transfer, get_validation};
