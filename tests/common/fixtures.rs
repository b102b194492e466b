//! Report rows and a wired-up report desk for tests.

use super::fakes::{FakeNotifier, FakeReportStore, FakeRpc};
use carmarket_admin::dispatch::ActionDispatcher;
use carmarket_admin::moderation::report::{ListingSummary, MessageSummary, Person};
use carmarket_admin::moderation::{ReportDesk, ReportKind, ReportRow, ReportStatus, ReportTarget};
use carmarket_admin::processing::ProcessingMarker;
use carmarket_admin::session::AdminContext;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_ROWS: u64 = 500;

pub fn admin() -> AdminContext {
    AdminContext {
        admin_id: Uuid::new_v4(),
        username: "moderator".to_string(),
    }
}

pub fn person(name: &str) -> Person {
    Person {
        id: Uuid::new_v4(),
        name: Some(name.to_string()),
        email: Some(format!("{}@example.com", name.to_lowercase())),
    }
}

/// `age_minutes` orders rows: larger is older.
fn row(kind: ReportKind, reason: &str, target: ReportTarget, age_minutes: i64) -> ReportRow {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    ReportRow {
        id: Uuid::new_v4(),
        kind,
        reporter: Some(person("Reporter")),
        reason: reason.to_string(),
        details: None,
        status: ReportStatus::Pending,
        resolution: None,
        target,
        created_at: base - Duration::minutes(age_minutes),
    }
}

pub fn listing_report(brand: &str, model: &str, reason: &str, age_minutes: i64) -> ReportRow {
    row(
        ReportKind::Listing,
        reason,
        ReportTarget::Listing(ListingSummary {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            brand: brand.to_string(),
            model: model.to_string(),
            year: 2018,
            status: "active".to_string(),
        }),
        age_minutes,
    )
}

pub fn message_report(sender: &str, content: &str, reason: &str, age_minutes: i64) -> ReportRow {
    row(
        ReportKind::Message,
        reason,
        ReportTarget::Message(MessageSummary {
            id: Uuid::new_v4(),
            sender: person(sender),
            receiver: person("Buyer"),
            content: content.to_string(),
        }),
        age_minutes,
    )
}

pub fn admin_report(brand: &str, reason: &str, age_minutes: i64) -> ReportRow {
    let mut report = listing_report(brand, "Any", reason, age_minutes);
    report.kind = ReportKind::Admin;
    report
}

pub fn resolved(mut report: ReportRow, status: ReportStatus) -> ReportRow {
    report.status = status;
    report
}

pub struct Harness {
    pub rpc: Arc<FakeRpc>,
    pub store: Arc<FakeReportStore>,
    pub notifier: Arc<FakeNotifier>,
    pub dispatcher: ActionDispatcher,
    pub desk: ReportDesk,
}

/// A desk over `rows` whose procedure calls resolve rows in the store.
pub fn harness(rows: Vec<ReportRow>) -> Harness {
    let store = FakeReportStore::with_rows(rows);
    let rpc = FakeRpc::backed_by(store.clone());
    let notifier = FakeNotifier::new();
    let dispatcher = ActionDispatcher::new(rpc.clone(), notifier.clone(), ProcessingMarker::new());
    let desk = ReportDesk::new(dispatcher.clone(), store.clone(), MAX_ROWS);

    Harness {
        rpc,
        store,
        notifier,
        dispatcher,
        desk,
    }
}
