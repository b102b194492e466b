//! Integration tests for approving and rejecting reports

mod common;

use carmarket_admin::error::ActionError;
use carmarket_admin::moderation::list::{ReportFilter, StatusFilter};
use carmarket_admin::moderation::{ApproveOptions, ReportStatus, SideEffectKind};
use carmarket_admin::notice::NoticeLevel;
use carmarket_admin::rpc::{Arg, Procedure};
use common::fixtures::*;
use uuid::Uuid;

fn every_status() -> ReportFilter {
    ReportFilter {
        status: StatusFilter::All,
        ..ReportFilter::default()
    }
}

fn text<'a>(params: &'a carmarket_admin::rpc::Params, name: &str) -> Option<&'a str> {
    params.get(name).and_then(Arg::as_text)
}

fn uuid(params: &carmarket_admin::rpc::Params, name: &str) -> Option<Uuid> {
    params.get(name).and_then(Arg::as_uuid)
}

#[actix_rt::test]
async fn test_approve_and_block_owner() {
    let report = listing_report("Toyota", "Corolla", "Scam listing", 5);
    let owner = report.content_owner().expect("listing has an owner");
    let h = harness(vec![report.clone()]);
    let admin = admin();

    let outcome = h
        .desk
        .approve(
            &admin,
            &report,
            ApproveOptions {
                notes: Some("ok".to_string()),
                delete_target: false,
                block_owner: true,
            },
            &every_status(),
        )
        .await
        .expect("approve succeeds");

    assert_eq!(
        h.rpc.procedures(),
        vec![Procedure::ProcessListingReport, Procedure::BlockUser]
    );

    let process = &h.rpc.calls_to(Procedure::ProcessListingReport)[0];
    assert_eq!(uuid(process, "p_report_id"), Some(report.id));
    assert_eq!(uuid(process, "p_admin_id"), Some(admin.admin_id));
    assert_eq!(text(process, "p_status"), Some("approved"));
    assert_eq!(text(process, "p_notes"), Some("ok"));

    let block = &h.rpc.calls_to(Procedure::BlockUser)[0];
    assert_eq!(uuid(block, "p_user_id"), Some(owner));
    assert_eq!(uuid(block, "p_admin_id"), Some(admin.admin_id));
    assert!(text(block, "p_reason").unwrap_or("").contains("ok"));

    assert_eq!(outcome.status, ReportStatus::Approved);
    assert!(outcome.side_effect(SideEffectKind::DeleteTarget).is_none());

    let refreshed = outcome.refreshed.as_ref().expect("list was refreshed");
    let row = refreshed.find(report.id).expect("report still listed");
    assert_eq!(row.status.label(), "Approved");
    assert!(row.available_actions().is_empty());
    let resolution = row.resolution.as_ref().expect("resolution recorded");
    assert_eq!(resolution.resolver, admin.admin_id);
    assert_eq!(resolution.notes.as_deref(), Some("ok"));

    assert!(outcome.notices().iter().all(|n| !n.is_error()));
    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.notifier.sent()[0].user_id, owner);
    assert!(h.dispatcher.processing().is_empty());
}

#[actix_rt::test]
async fn test_failed_delete_does_not_undo_approval() {
    let report = listing_report("BMW", "320d", "Stolen vehicle", 1);
    let h = harness(vec![report.clone()]);
    h.rpc.fail(Procedure::DeleteListing);

    let outcome = h
        .desk
        .approve(
            &admin(),
            &report,
            ApproveOptions {
                notes: None,
                delete_target: true,
                block_owner: true,
            },
            &every_status(),
        )
        .await
        .expect("approve still succeeds");

    assert_eq!(
        h.rpc.procedures(),
        vec![
            Procedure::ProcessListingReport,
            Procedure::BlockUser,
            Procedure::DeleteListing
        ]
    );
    assert_eq!(outcome.status, ReportStatus::Approved);
    assert!(outcome
        .side_effect(SideEffectKind::BlockOwner)
        .map(|s| s.is_ok())
        .unwrap_or(false));
    assert!(!outcome
        .side_effect(SideEffectKind::DeleteTarget)
        .map(|s| s.is_ok())
        .unwrap_or(true));

    let notices = outcome.notices();
    assert_eq!(notices[0].level, NoticeLevel::Success);
    assert_eq!(notices.iter().filter(|n| n.is_error()).count(), 1);

    let stored = h.store.row(report.id).expect("row exists");
    assert_eq!(stored.status, ReportStatus::Approved);

    // Block reason falls back to the report reason without notes.
    let block = &h.rpc.calls_to(Procedure::BlockUser)[0];
    assert!(text(block, "p_reason").unwrap_or("").contains("Stolen vehicle"));
}

#[actix_rt::test]
async fn test_failed_process_skips_side_effects() {
    let report = listing_report("Audi", "A4", "Fake photos", 1);
    let h = harness(vec![report.clone()]);
    h.rpc.fail(Procedure::ProcessListingReport);

    let result = h
        .desk
        .approve(
            &admin(),
            &report,
            ApproveOptions {
                notes: Some("confirmed".to_string()),
                delete_target: true,
                block_owner: true,
            },
            &every_status(),
        )
        .await;

    assert!(matches!(result, Err(ActionError::Remote(_))));
    assert_eq!(h.rpc.procedures(), vec![Procedure::ProcessListingReport]);
    assert_eq!(
        h.store.row(report.id).map(|r| r.status),
        Some(ReportStatus::Pending)
    );
    assert!(h.dispatcher.processing().is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[actix_rt::test]
async fn test_approve_message_report_deletes_message() {
    let report = message_report("Seller", "send a deposit first", "Fraud", 2);
    let message_id = report.target_id();
    let h = harness(vec![report.clone()]);

    h.desk
        .approve(
            &admin(),
            &report,
            ApproveOptions {
                notes: None,
                delete_target: true,
                block_owner: false,
            },
            &every_status(),
        )
        .await
        .expect("approve succeeds");

    assert_eq!(
        h.rpc.procedures(),
        vec![Procedure::ProcessMessageReport, Procedure::DeleteMessage]
    );
    let delete = &h.rpc.calls_to(Procedure::DeleteMessage)[0];
    assert_eq!(uuid(delete, "p_message_id"), Some(message_id));
}

#[actix_rt::test]
async fn test_block_without_owner_is_reported_not_sent() {
    let mut report = listing_report("Ford", "Focus", "Spam", 1);
    report.target = carmarket_admin::moderation::ReportTarget::Missing {
        id: report.target_id(),
    };
    let h = harness(vec![report.clone()]);

    let outcome = h
        .desk
        .approve(
            &admin(),
            &report,
            ApproveOptions {
                notes: None,
                delete_target: false,
                block_owner: true,
            },
            &every_status(),
        )
        .await
        .expect("approve succeeds");

    assert_eq!(h.rpc.procedures(), vec![Procedure::ProcessListingReport]);
    assert!(matches!(
        outcome.side_effect(SideEffectKind::BlockOwner).map(|s| &s.result),
        Some(Err(ActionError::NotFound(_)))
    ));
}

#[actix_rt::test]
async fn test_reject_with_empty_notes_sends_nothing() {
    let report = listing_report("Kia", "Ceed", "Wrong price", 1);
    let h = harness(vec![report.clone()]);

    for notes in ["", "   "] {
        let result = h
            .desk
            .reject(&admin(), &report, notes, &every_status())
            .await;
        match result {
            Err(ActionError::Validation(msg)) => assert!(!msg.is_empty()),
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    assert!(h.rpc.calls().is_empty());
    assert_eq!(
        h.store.row(report.id).map(|r| r.status),
        Some(ReportStatus::Pending)
    );
}

#[actix_rt::test]
async fn test_reject_is_a_single_call() {
    let report = message_report("Seller", "hello", "Harassment", 1);
    let h = harness(vec![report.clone()]);

    let outcome = h
        .desk
        .reject(&admin(), &report, " not harassment ", &every_status())
        .await
        .expect("reject succeeds");

    let calls = h.rpc.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, Procedure::ProcessMessageReport);
    assert_eq!(text(&calls[0].1, "p_status"), Some("rejected"));
    assert_eq!(text(&calls[0].1, "p_notes"), Some("not harassment"));

    assert_eq!(outcome.status, ReportStatus::Rejected);
    assert!(outcome.side_effects.is_empty());
    let row = outcome
        .refreshed
        .as_ref()
        .and_then(|l| l.find(report.id))
        .expect("report listed");
    assert_eq!(row.status, ReportStatus::Rejected);
}

#[actix_rt::test]
async fn test_resolved_reports_cannot_be_resolved_again() {
    let approved = resolved(listing_report("Opel", "Astra", "Spam", 1), ReportStatus::Approved);
    let rejected = resolved(message_report("Seller", "hi", "Spam", 1), ReportStatus::Rejected);
    let h = harness(vec![approved.clone(), rejected.clone()]);

    assert!(approved.available_actions().is_empty());
    assert!(matches!(
        h.desk
            .approve(&admin(), &approved, ApproveOptions::default(), &every_status())
            .await,
        Err(ActionError::NotPending)
    ));
    assert!(matches!(
        h.desk
            .reject(&admin(), &rejected, "changed my mind", &every_status())
            .await,
        Err(ActionError::NotPending)
    ));
    assert!(h.rpc.calls().is_empty());
}

#[actix_rt::test]
async fn test_double_approve_calls_once() {
    let report = listing_report("Skoda", "Octavia", "Duplicate", 1);
    let other = message_report("Seller", "call me", "Spam", 2);
    let h = harness(vec![report.clone(), other.clone()]);
    let admin = admin();
    let filter = every_status();

    let gate = h.rpc.hold_next();
    let mut first = Box::pin(h.desk.approve(&admin, &report, ApproveOptions::default(), &filter));
    assert!(futures::poll!(&mut first).is_pending());
    assert!(h.dispatcher.processing().is_processing(&report.marker_key()));

    let second = h
        .desk
        .approve(&admin, &report, ApproveOptions::default(), &filter)
        .await;
    assert!(matches!(second, Err(ActionError::InProgress)));
    let rejected = h.desk.reject(&admin, &report, "dup", &filter).await;
    assert!(matches!(rejected, Err(ActionError::InProgress)));

    // Other reports are not held up.
    h.desk
        .reject(&admin, &other, "not spam", &filter)
        .await
        .expect("other report resolves");

    gate.send(()).expect("first call still waiting");
    let outcome = first.await.expect("first approve succeeds");
    assert_eq!(outcome.status, ReportStatus::Approved);

    assert_eq!(h.rpc.calls_to(Procedure::ProcessListingReport).len(), 1);
    assert_eq!(h.rpc.calls_to(Procedure::ProcessMessageReport).len(), 1);
    assert!(h.dispatcher.processing().is_empty());
}

#[actix_rt::test]
async fn test_failed_refresh_is_a_warning() {
    let report = listing_report("Mazda", "3", "Spam", 1);
    let h = harness(vec![report.clone()]);
    h.store.break_fetches();

    let outcome = h
        .desk
        .reject(&admin(), &report, "fine", &every_status())
        .await
        .expect("reject succeeds");

    assert!(outcome.refreshed.is_none());
    let notices = outcome.notices();
    assert_eq!(notices[0].level, NoticeLevel::Success);
    assert!(notices.iter().any(|n| n.level == NoticeLevel::Warning));
}

#[actix_rt::test]
async fn test_admin_report_on_listing() {
    let h = harness(Vec::new());
    let admin = admin();
    let listing_id = Uuid::new_v4();

    assert!(matches!(
        h.desk.report_listing(&admin, listing_id, "  ", None).await,
        Err(ActionError::Validation(_))
    ));

    h.desk
        .report_listing(&admin, listing_id, " Odometer rollback ", Some("  "))
        .await
        .expect("report filed");

    let filed = h.store.filed();
    assert_eq!(filed.len(), 1);
    assert_eq!(filed[0].0, admin.admin_id);
    assert_eq!(filed[0].1, listing_id);
    assert_eq!(filed[0].2, "Odometer rollback");
    assert_eq!(filed[0].3, None);
    assert!(h.rpc.calls().is_empty());
}
