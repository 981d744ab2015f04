//! Shared fixtures for backend integration tests

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use scan_verification::config::ScanningConfig;
use scan_verification::services::{
    FinalizeService, LedgerService, LineService, PackagingService, PrefillInput, ReconcileService,
};
use scan_verification::store::{LineStore, MemoryLineStore};
use scan_verification::ScanContext;
use shared::{normalize, ExpectedLine, LotKey, ReconciliationResult, ScanEvent};
use uuid::Uuid;

pub fn product() -> Uuid {
    Uuid::from_u128(0x42)
}

pub fn key(raw: &str) -> LotKey {
    normalize(raw).unwrap()
}

/// Services wired to one in-memory store
pub struct Harness {
    pub store: Arc<MemoryLineStore>,
    pub ctx: ScanContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_scanning(ScanningConfig::default())
    }

    pub fn with_scanning(scanning: ScanningConfig) -> Self {
        let store = Arc::new(MemoryLineStore::new());
        let ctx = ScanContext::new(store.clone() as Arc<dyn LineStore>, scanning);
        Self { store, ctx }
    }

    pub fn reconciler(&self) -> ReconcileService {
        ReconcileService::new(self.ctx.clone())
    }

    pub fn lines(&self) -> LineService {
        LineService::new(self.ctx.clone())
    }

    pub fn ledger(&self) -> LedgerService {
        LedgerService::new(self.ctx.clone())
    }

    pub fn packaging(&self) -> PackagingService {
        PackagingService::new(self.ctx.clone())
    }

    pub fn finalizer(&self) -> FinalizeService {
        FinalizeService::new(self.ctx.clone())
    }

    /// Draft operation with enhanced verification as given
    pub async fn operation(&self, enhanced: bool) -> Uuid {
        self.store
            .create_operation("WH/IN/00001", enhanced)
            .await
            .unwrap()
            .id
    }

    /// Pre-fill one line per lot, in the given order
    pub async fn prefill(&self, op: Uuid, lots: &[&str]) -> Vec<ExpectedLine> {
        let mut lines = Vec::new();
        for lot in lots {
            let input = PrefillInput {
                product_id: product(),
                uom: None,
                lot_name: lot.to_string(),
                expected_qty: None,
            };
            lines.push(self.lines().prefill_line(op, input).await.unwrap());
        }
        lines
    }

    pub async fn scan(&self, op: Uuid, raw: &str) -> ReconciliationResult {
        self.reconciler()
            .reconcile(ScanEvent::new(op, raw))
            .await
            .unwrap()
    }

    /// Scan with the fixture product as hint (free registration)
    pub async fn scan_with_product(&self, op: Uuid, raw: &str) -> ReconciliationResult {
        self.reconciler()
            .reconcile(ScanEvent::new(op, raw).with_product(product()))
            .await
            .unwrap()
    }

    pub async fn line_for(&self, op: Uuid, lot: &str) -> ExpectedLine {
        let key = key(lot);
        self.store
            .load_lines(op)
            .await
            .unwrap()
            .into_iter()
            .find(|l| l.binds(&key))
            .unwrap()
    }

    pub async fn snapshot(&self, op: Uuid) -> Vec<LotKey> {
        self.ctx.ledger.snapshot(op).await
    }
}

pub fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}
