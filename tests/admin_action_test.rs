//! Integration tests for single-call admin actions

mod common;

use carmarket_admin::dispatch::{AdminAction, ActionDispatcher, MAX_PURCHASE_SLOTS};
use carmarket_admin::error::ActionError;
use carmarket_admin::processing::ProcessingMarker;
use carmarket_admin::rpc::{Arg, Procedure};
use chrono::{Duration, Utc};
use common::fakes::{FakeNotifier, FakeRpc};
use common::fixtures::admin;
use std::sync::Arc;
use uuid::Uuid;

fn dispatcher() -> (Arc<FakeRpc>, Arc<FakeNotifier>, ActionDispatcher) {
    let rpc = FakeRpc::new();
    let notifier = FakeNotifier::new();
    let dispatcher = ActionDispatcher::new(rpc.clone(), notifier.clone(), ProcessingMarker::new());
    (rpc, notifier, dispatcher)
}

#[actix_rt::test]
async fn test_unblock_is_idempotent() {
    let (rpc, _, dispatcher) = dispatcher();
    let admin = admin();
    let user_id = Uuid::new_v4();

    for _ in 0..2 {
        let notice = dispatcher
            .dispatch(&admin, AdminAction::UnblockUser { user_id })
            .await
            .expect("unblock succeeds");
        assert!(!notice.is_error());
    }

    let calls = rpc.calls_to(Procedure::UnblockUser);
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0].get("p_user_id").and_then(Arg::as_uuid),
        Some(user_id)
    );
}

#[actix_rt::test]
async fn test_block_sends_reason_and_notifies() {
    let (rpc, notifier, dispatcher) = dispatcher();
    let admin = admin();
    let user_id = Uuid::new_v4();
    let until = Utc::now() + Duration::days(7);

    dispatcher
        .dispatch(
            &admin,
            AdminAction::BlockUser {
                user_id,
                reason: " Repeated spam ".to_string(),
                until: Some(until),
            },
        )
        .await
        .expect("block succeeds");

    let params = &rpc.calls_to(Procedure::BlockUser)[0];
    assert_eq!(
        params.get("p_reason").and_then(Arg::as_text),
        Some("Repeated spam")
    );
    assert_eq!(
        params.get("p_blocked_until"),
        Some(&Arg::Timestamp(Some(until)))
    );

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, user_id);
    assert!(sent[0].message.contains("Repeated spam"));
}

#[actix_rt::test]
async fn test_notifier_outage_does_not_fail_action() {
    let (rpc, notifier, dispatcher) = dispatcher();
    notifier.go_down();

    let result = dispatcher
        .dispatch(
            &admin(),
            AdminAction::RejectCorporate {
                user_id: Uuid::new_v4(),
                reason: "Missing trade register extract".to_string(),
            },
        )
        .await;

    assert!(result.is_ok());
    assert_eq!(rpc.procedures(), vec![Procedure::RejectCorporateUser]);
    assert!(notifier.sent().is_empty());
}

#[actix_rt::test]
async fn test_invalid_actions_make_no_calls() {
    let (rpc, _, dispatcher) = dispatcher();
    let admin = admin();

    let invalid = vec![
        AdminAction::PurchaseSlots {
            user_id: Uuid::new_v4(),
            slots: 0,
        },
        AdminAction::PurchaseSlots {
            user_id: Uuid::new_v4(),
            slots: MAX_PURCHASE_SLOTS + 1,
        },
        AdminAction::BlockUser {
            user_id: Uuid::new_v4(),
            reason: String::new(),
            until: None,
        },
        AdminAction::RejectPurchase {
            request_id: Uuid::new_v4(),
            reason: "  ".to_string(),
        },
        AdminAction::DeleteAdmin {
            target_admin_id: admin.admin_id,
        },
    ];

    for action in invalid {
        let result = dispatcher.dispatch(&admin, action.clone()).await;
        assert!(
            matches!(result, Err(ActionError::Validation(_))),
            "{:?} should fail validation",
            action
        );
    }
    assert!(rpc.calls().is_empty());
    assert!(dispatcher.processing().is_empty());
}

#[actix_rt::test]
async fn test_remote_failure_is_generic_and_releases_marker() {
    let (rpc, notifier, dispatcher) = dispatcher();
    rpc.fail(Procedure::ApproveCorporateUser);
    let user_id = Uuid::new_v4();

    let err = dispatcher
        .dispatch(&admin(), AdminAction::ApproveCorporate { user_id })
        .await
        .expect_err("procedure refused");

    assert!(matches!(err, ActionError::Remote(_)));
    assert!(!err.user_message().contains("refused"));
    assert!(notifier.sent().is_empty());
    assert!(dispatcher.processing().is_empty());

    // The admin can retry straight away.
    assert_eq!(rpc.calls_to(Procedure::ApproveCorporateUser).len(), 1);
    let _ = dispatcher
        .dispatch(&admin(), AdminAction::ApproveCorporate { user_id })
        .await;
    assert_eq!(rpc.calls_to(Procedure::ApproveCorporateUser).len(), 2);
}

#[actix_rt::test]
async fn test_same_user_actions_exclude_each_other() {
    let (rpc, _, dispatcher) = dispatcher();
    let admin = admin();
    let user_id = Uuid::new_v4();

    let gate = rpc.hold_next();
    let mut first = Box::pin(dispatcher.dispatch(&admin, AdminAction::UnblockUser { user_id }));
    assert!(futures::poll!(&mut first).is_pending());

    let second = dispatcher
        .dispatch(
            &admin,
            AdminAction::PurchaseSlots {
                user_id,
                slots: 3,
            },
        )
        .await;
    assert!(matches!(second, Err(ActionError::InProgress)));

    dispatcher
        .dispatch(
            &admin,
            AdminAction::UnblockUser {
                user_id: Uuid::new_v4(),
            },
        )
        .await
        .expect("different user is not held up");

    gate.send(()).expect("first call still waiting");
    first.await.expect("first action succeeds");
    assert_eq!(rpc.calls_to(Procedure::PurchaseListingSlots).len(), 0);
    assert_eq!(rpc.calls_to(Procedure::UnblockUser).len(), 2);
}
