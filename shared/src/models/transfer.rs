//! Transfer operation and line models

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{normalize, LotKey};

/// A stored state or origin name that matches no variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownName {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Lifecycle of a transfer operation as far as scanning is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Draft,
    Finalized,
    Cancelled,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Draft => "draft",
            TransferState::Finalized => "finalized",
            TransferState::Cancelled => "cancelled",
        }
    }

}

impl FromStr for TransferState {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(TransferState::Draft),
            "finalized" => Ok(TransferState::Finalized),
            "cancelled" => Ok(TransferState::Cancelled),
            _ => Err(UnknownName::new("transfer state", s)),
        }
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A warehouse transfer (receipt, delivery, internal move) being scanned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOperation {
    pub id: Uuid,
    /// Human reference, e.g. "WH/IN/00042"
    pub reference: String,
    /// Operation-type flag that turns on one-identifier-one-unit verification
    pub enhanced_verification: bool,
    pub state: TransferState,
    pub lines: Vec<ExpectedLine>,
}

impl TransferOperation {
    pub fn is_open(&self) -> bool {
        self.state == TransferState::Draft
    }
}

/// Identity of a line: saved in the host, or still pending its first save.
///
/// Pending lines carry a client-side key so the caller can match the saved
/// record back to what it submitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LineRef {
    Persisted(Uuid),
    Pending(String),
}

impl LineRef {
    /// Fresh pending reference with a random local key
    pub fn new_pending() -> Self {
        LineRef::Pending(format!("pending-{}", Uuid::new_v4()))
    }

    pub fn persisted_id(&self) -> Option<Uuid> {
        match self {
            LineRef::Persisted(id) => Some(*id),
            LineRef::Pending(_) => None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, LineRef::Persisted(_))
    }
}

impl std::fmt::Display for LineRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineRef::Persisted(id) => write!(f, "{}", id),
            LineRef::Pending(key) => write!(f, "{}", key),
        }
    }
}

/// How a line came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineOrigin {
    /// Entered by hand before scanning started
    Prefilled,
    /// Created by a scan in free-registration mode, or by the host directly
    Scanned,
}

impl LineOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineOrigin::Prefilled => "prefilled",
            LineOrigin::Scanned => "scanned",
        }
    }

}

impl FromStr for LineOrigin {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prefilled" => Ok(LineOrigin::Prefilled),
            "scanned" => Ok(LineOrigin::Scanned),
            _ => Err(UnknownName::new("line origin", s)),
        }
    }
}

/// One (product, quantity) pairing inside a transfer, optionally bound to a lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedLine {
    pub line_ref: LineRef,
    pub operation_id: Uuid,
    pub product_id: Uuid,
    /// Unit of measure label the quantities are expressed in
    pub uom: String,
    pub expected_qty: Decimal,
    pub consumed_qty: Decimal,
    /// Bound lot/serial identifier as the operator typed or scanned it
    pub lot_name: Option<String>,
    pub origin: LineOrigin,
    pub package_id: Option<Uuid>,
    /// 1-based physical scan position, set when the line is packed
    pub scan_order: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl ExpectedLine {
    /// A pending pre-fill line bound to `lot_name`, nothing consumed yet
    pub fn prefill(
        operation_id: Uuid,
        product_id: Uuid,
        uom: impl Into<String>,
        lot_name: impl Into<String>,
        expected_qty: Decimal,
    ) -> Self {
        Self {
            line_ref: LineRef::new_pending(),
            operation_id,
            product_id,
            uom: uom.into(),
            expected_qty,
            consumed_qty: Decimal::ZERO,
            lot_name: Some(lot_name.into()),
            origin: LineOrigin::Prefilled,
            package_id: None,
            scan_order: None,
            created_at: Utc::now(),
        }
    }

    /// A pending line created by a scan, already consumed by `quantity`
    pub fn registered(
        operation_id: Uuid,
        product_id: Uuid,
        uom: impl Into<String>,
        lot_name: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        Self {
            line_ref: LineRef::new_pending(),
            operation_id,
            product_id,
            uom: uom.into(),
            expected_qty: quantity,
            consumed_qty: quantity,
            lot_name: Some(lot_name.into()),
            origin: LineOrigin::Scanned,
            package_id: None,
            scan_order: None,
            created_at: Utc::now(),
        }
    }

    /// Normalized key of the bound identifier; `None` when unbound or blank
    pub fn lot_key(&self) -> Option<LotKey> {
        self.lot_name.as_deref().and_then(|name| normalize(name).ok())
    }

    pub fn binds(&self, key: &LotKey) -> bool {
        self.lot_key().as_ref() == Some(key)
    }

    /// A line counts as scanned/accepted once anything has been consumed
    pub fn is_accepted(&self) -> bool {
        self.consumed_qty > Decimal::ZERO
    }

    pub fn is_fully_consumed(&self) -> bool {
        self.consumed_qty >= self.expected_qty
    }

    pub fn remaining_qty(&self) -> Decimal {
        (self.expected_qty - self.consumed_qty).max(Decimal::ZERO)
    }

    /// Pre-filled and bound: part of the operation's expected list
    pub fn is_prefill(&self) -> bool {
        self.origin == LineOrigin::Prefilled && self.lot_key().is_some()
    }
}
