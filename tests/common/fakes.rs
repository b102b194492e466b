//! In-memory stand-ins for the database procedures, report tables and the
//! notification endpoint.

use async_trait::async_trait;
use carmarket_admin::error::ActionError;
use carmarket_admin::moderation::list::ReportStore;
use carmarket_admin::moderation::{ReportKind, ReportRow, ReportStatus, Resolution};
use carmarket_admin::notify::{Notifier, NotifyError, UserNotification};
use carmarket_admin::rpc::{Params, Procedure, Rpc, RpcError};
use chrono::Utc;
use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Records every procedure call. Chosen procedures fail. When backed by a
/// report store, successful process calls resolve the row like the real
/// procedure does.
#[derive(Default)]
pub struct FakeRpc {
    calls: Mutex<Vec<(Procedure, Params)>>,
    failing: Mutex<HashSet<Procedure>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    store: Option<Arc<FakeReportStore>>,
}

impl FakeRpc {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn backed_by(store: Arc<FakeReportStore>) -> Arc<Self> {
        Arc::new(Self {
            store: Some(store),
            ..Self::default()
        })
    }

    pub fn fail(&self, procedure: Procedure) {
        self.failing.lock().unwrap().insert(procedure);
    }

    /// The next call blocks until the returned sender fires or is dropped.
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<(Procedure, Params)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn procedures(&self) -> Vec<Procedure> {
        self.calls.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    pub fn calls_to(&self, procedure: Procedure) -> Vec<Params> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == procedure)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

#[async_trait]
impl Rpc for FakeRpc {
    async fn call(
        &self,
        procedure: Procedure,
        params: Params,
    ) -> Result<serde_json::Value, RpcError> {
        self.calls.lock().unwrap().push((procedure, params.clone()));

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if self.failing.lock().unwrap().contains(&procedure) {
            return Err(RpcError::Rejected(format!("{} refused", procedure)));
        }

        if let Some(store) = &self.store {
            store.apply(procedure, &params);
        }
        Ok(serde_json::json!({ "success": true }))
    }
}

/// Report tables held in memory.
#[derive(Default)]
pub struct FakeReportStore {
    rows: Mutex<Vec<ReportRow>>,
    broken: AtomicBool,
    filed: Mutex<Vec<(Uuid, Uuid, String, Option<String>)>>,
    gate: Mutex<Option<Shared<oneshot::Receiver<()>>>>,
}

impl FakeReportStore {
    pub fn with_rows(rows: Vec<ReportRow>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
            ..Self::default()
        })
    }

    /// Every later fetch waits until the returned sender fires or drops.
    pub fn hold_fetches(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx.shared());
        tx
    }

    pub fn insert(&self, row: ReportRow) {
        self.rows.lock().unwrap().push(row);
    }

    /// Every later fetch fails.
    pub fn break_fetches(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn row(&self, id: Uuid) -> Option<ReportRow> {
        self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    /// Admin reports filed so far: (admin, listing, reason, details).
    pub fn filed(&self) -> Vec<(Uuid, Uuid, String, Option<String>)> {
        self.filed.lock().unwrap().clone()
    }

    fn apply(&self, procedure: Procedure, params: &Params) {
        let kind = match procedure {
            Procedure::ProcessListingReport => ReportKind::Listing,
            Procedure::ProcessMessageReport => ReportKind::Message,
            Procedure::ProcessAdminReport => ReportKind::Admin,
            _ => return,
        };
        let id = params.get("p_report_id").and_then(|a| a.as_uuid());
        let admin = params.get("p_admin_id").and_then(|a| a.as_uuid());
        let status = params
            .get("p_status")
            .and_then(|a| a.as_text())
            .and_then(ReportStatus::parse);
        let notes = params
            .get("p_notes")
            .and_then(|a| a.as_text())
            .map(str::to_string);

        if let (Some(id), Some(admin), Some(status)) = (id, admin, status) {
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows.iter_mut().find(|r| r.id == id && r.kind == kind) {
                row.status = status;
                row.resolution = Some(Resolution {
                    resolver: admin,
                    resolved_at: Utc::now(),
                    notes,
                });
            }
        }
    }
}

#[async_trait]
impl ReportStore for FakeReportStore {
    async fn fetch(
        &self,
        kind: ReportKind,
        status: Option<ReportStatus>,
        limit: u64,
    ) -> Result<Vec<ReportRow>, ActionError> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(ActionError::Remote("connection reset".to_string()));
        }

        let mut rows: Vec<ReportRow> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind && status.map(|s| r.status == s).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn find(&self, kind: ReportKind, id: Uuid) -> Result<Option<ReportRow>, ActionError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.kind == kind && r.id == id)
            .cloned())
    }

    async fn create_admin_report(
        &self,
        admin_id: Uuid,
        listing_id: Uuid,
        reason: &str,
        details: Option<&str>,
    ) -> Result<Uuid, ActionError> {
        self.filed.lock().unwrap().push((
            admin_id,
            listing_id,
            reason.to_string(),
            details.map(str::to_string),
        ));
        Ok(Uuid::new_v4())
    }
}

/// Collects notifications instead of posting them.
#[derive(Default)]
pub struct FakeNotifier {
    sent: Mutex<Vec<UserNotification>>,
    down: AtomicBool,
}

impl FakeNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<UserNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, notification: UserNotification) -> Result<(), NotifyError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(NotifyError::Status(503));
        }
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}
