//! WebAssembly module for Lot Scan Verification
//!
//! Lets the scanning client work before a round trip:
//! - Identifier normalization, identical to the server's
//! - Offline duplicate / not-in-list pre-check
//! - Unit quantity check under enhanced verification
//! - Outstanding lots and finalize check over cached lines

use std::str::FromStr;

use rust_decimal::Decimal;
use shared::{ExpectedLine, ScanOutcome};
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;

fn parse_lines(lines_json: &str) -> Result<Vec<ExpectedLine>, JsValue> {
    serde_json::from_str(lines_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid lines JSON: {}", e)))
}

fn parse_list(list_json: &str) -> Result<Vec<String>, JsValue> {
    serde_json::from_str(list_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid identifier list JSON: {}", e)))
}

/// Normalized key of a scanned identifier
#[wasm_bindgen]
pub fn normalize_lot(raw: &str) -> Result<String, JsValue> {
    shared::normalize(raw)
        .map(|key| key.as_str().to_string())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Whether two scans name the same lot
#[wasm_bindgen]
pub fn same_lot(a: &str, b: &str) -> bool {
    match (shared::normalize(a), shared::normalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Pre-check a scan against the lists the client holds.
///
/// Returns the expected outcome tag. `free_registration` comes from
/// [`is_free_registration`]; with it false an empty `outstanding` list means
/// every pre-filled lot is consumed.
#[wasm_bindgen]
pub fn precheck_scan(
    raw: &str,
    free_registration: bool,
    outstanding_json: &str,
    accepted_json: &str,
) -> Result<String, JsValue> {
    let outstanding = parse_list(outstanding_json)?;
    let accepted = parse_list(accepted_json)?;

    match shared::precheck(raw, free_registration, &outstanding, &accepted) {
        Ok(outcome) => {
            if outcome != ScanOutcome::Accepted {
                web_sys::console::warn_1(&JsValue::from_str(&format!(
                    "scan '{}' would be {}",
                    raw.trim(),
                    outcome
                )));
            }
            Ok(outcome.as_str().to_string())
        }
        Err(e) => Err(JsValue::from_str(&e.to_string())),
    }
}

/// Check a typed quantity against the one-unit-per-identifier policy
#[wasm_bindgen]
pub fn is_unit_quantity(quantity: &str) -> bool {
    Decimal::from_str(quantity.trim())
        .map(|q| shared::check_unit_quantity(Some(q)).is_ok())
        .unwrap_or(false)
}

/// Whether the cached lines carry no pre-fill, so scans register new lines
#[wasm_bindgen]
pub fn is_free_registration(lines_json: &str) -> Result<bool, JsValue> {
    let lines = parse_lines(lines_json)?;
    Ok(shared::ExpectedSet::build(&lines).is_free_registration())
}

/// Outstanding pre-filled lots, sorted for display
#[wasm_bindgen]
pub fn outstanding_lots(lines_json: &str) -> Result<js_sys::Array, JsValue> {
    let lines = parse_lines(lines_json)?;
    let expected = shared::ExpectedSet::build(&lines);
    Ok(expected
        .outstanding_display()
        .into_iter()
        .map(JsValue::from)
        .collect())
}

/// Run the finalize check on cached lines; returns the report as JSON
#[wasm_bindgen]
pub fn check_finalize(lines_json: &str) -> Result<String, JsValue> {
    let lines = parse_lines(lines_json)?;
    let report = shared::check_finalize(&lines).map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_json::to_string(&report).map_err(|e| JsValue::from_str(&e.to_string()))
}
