use anyhow::anyhow;
use bridgekit_request::{
    CallbackKind, Request, RequestError, RequestOptions, RequestStatus, Settlement,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Construction ─────────────────────────────────────────────────

#[test]
fn generated_ids_are_unique_uuids() {
    let a = Request::new(RequestOptions::new());
    let b = Request::new(RequestOptions::new());
    assert_ne!(a.id(), b.id());
    assert!(uuid::Uuid::parse_str(a.id()).is_ok());
}

#[test]
fn options_carry_id_and_data() {
    let req = Request::new(
        RequestOptions::new()
            .with_id("req-1")
            .with_data(json!({"kind": "invite", "target": "@bob:example.org"})),
    );
    assert_eq!(req.id(), "req-1");
    assert_eq!(req.data()["kind"], "invite");
}

#[test]
fn new_request_is_pending() {
    let req = Request::new(RequestOptions::default());
    assert!(req.is_pending());
    assert_eq!(req.status(), RequestStatus::Pending);
    assert!(req.outcome().is_none());
    assert!(req.data().is_null());
}

// ── Settlement ───────────────────────────────────────────────────

#[test]
fn resolve_stores_value() {
    let req = Request::new(RequestOptions::new());
    req.resolve(json!({"event_id": "$abc"})).unwrap();

    assert!(!req.is_pending());
    match req.outcome() {
        Some(Settlement::Resolved(value)) => assert_eq!(value["event_id"], "$abc"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn reject_stores_error() {
    let req = Request::new(RequestOptions::new());
    req.reject(anyhow!("M_FORBIDDEN")).unwrap();

    assert_eq!(req.status(), RequestStatus::Rejected);
    match req.outcome() {
        Some(Settlement::Rejected(err)) => assert_eq!(err.to_string(), "M_FORBIDDEN"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn reject_accepts_std_errors() {
    let req = Request::new(RequestOptions::new());
    let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out");
    req.reject(io).unwrap();
    assert_eq!(req.status(), RequestStatus::Rejected);
}

#[test]
fn second_settlement_is_rejected_and_changes_nothing() {
    let req = Request::new(RequestOptions::new().with_id("once"));
    req.resolve(1).unwrap();

    let err = req.reject(anyhow!("too late")).unwrap_err();
    assert!(matches!(
        err,
        RequestError::AlreadySettled { status: RequestStatus::Resolved, .. }
    ));
    assert_eq!(err.request_id(), "once");
    assert!(matches!(req.resolve(2), Err(RequestError::AlreadySettled { .. })));

    match req.outcome() {
        Some(Settlement::Resolved(value)) => assert_eq!(value, json!(1)),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn clones_share_state() {
    let req = Request::new(RequestOptions::new());
    let handle = req.clone();
    handle.resolve("via clone").unwrap();
    assert_eq!(req.status(), RequestStatus::Resolved);
}

// ── Settlement listeners ─────────────────────────────────────────

#[test]
fn listeners_run_in_subscription_order() {
    let req = Request::new(RequestOptions::new());
    let order = Arc::new(Mutex::new(Vec::new()));
    for n in 0..3 {
        let order = order.clone();
        req.on_settled(move |_, settlement| {
            order.lock().unwrap().push((n, settlement.status()));
            Ok(())
        })
        .unwrap();
    }

    req.resolve(json!(null)).unwrap();
    assert_eq!(
        *order.lock().unwrap(),
        vec![
            (0, RequestStatus::Resolved),
            (1, RequestStatus::Resolved),
            (2, RequestStatus::Resolved)
        ]
    );
}

#[test]
fn listener_on_settled_request_runs_immediately() {
    let req = Request::new(RequestOptions::new());
    req.reject(anyhow!("gone")).unwrap();

    let seen = Arc::new(Mutex::new(None));
    {
        let seen = seen.clone();
        req.on_settled(move |_, settlement| {
            *seen.lock().unwrap() = Some(settlement.status());
            Ok(())
        })
        .unwrap();
    }
    assert_eq!(*seen.lock().unwrap(), Some(RequestStatus::Rejected));
}

#[test]
fn listener_error_surfaces_from_settle() {
    let req = Request::new(RequestOptions::new().with_id("l"));
    req.on_settled(|request, _| {
        Err(RequestError::CallbackFault {
            id: request.id().to_string(),
            kind: CallbackKind::Resolve,
            index: 0,
            source: anyhow!("listener failed"),
        })
    })
    .unwrap();

    let err = req.resolve(1).unwrap_err();
    assert_eq!(err.request_id(), "l");
    assert!(!req.is_pending());
}

// ── Async helpers ────────────────────────────────────────────────

#[tokio::test]
async fn outcome_from_resolves_on_ok() {
    let req = Request::new(RequestOptions::new());
    req.outcome_from(async { Ok::<_, anyhow::Error>(json!({"ok": true})) })
        .await
        .unwrap();
    assert_eq!(req.status(), RequestStatus::Resolved);
}

#[tokio::test]
async fn outcome_from_rejects_on_err() {
    let req = Request::new(RequestOptions::new());
    req.outcome_from(async { Err::<serde_json::Value, _>(anyhow!("upstream 502")) })
        .await
        .unwrap();
    assert_eq!(req.status(), RequestStatus::Rejected);
}

#[tokio::test]
async fn settled_wakes_on_settlement() {
    let req = Request::new(RequestOptions::new());
    let waiter = {
        let req = req.clone();
        tokio::spawn(async move { req.settled().await })
    };

    tokio::task::yield_now().await;
    req.resolve(json!(42)).unwrap();

    match waiter.await.unwrap() {
        Settlement::Resolved(value) => assert_eq!(value, json!(42)),
        other => panic!("unexpected settlement: {other:?}"),
    }
}

#[tokio::test]
async fn settled_returns_immediately_when_already_settled() {
    let req = Request::new(RequestOptions::new());
    req.reject(anyhow!("done")).unwrap();
    assert_eq!(req.settled().await.status(), RequestStatus::Rejected);
}

#[tokio::test(start_paused = true)]
async fn duration_tracks_elapsed_time() {
    let req = Request::new(RequestOptions::new());
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(req.duration() >= Duration::from_millis(250));
}

// ── Errors ───────────────────────────────────────────────────────

#[test]
fn error_display_already_settled() {
    let err = RequestError::AlreadySettled {
        id: "r1".into(),
        status: RequestStatus::Rejected,
    };
    assert_eq!(err.to_string(), "request r1 is already rejected");
}

#[test]
fn error_display_callback_fault() {
    let err = RequestError::CallbackFault {
        id: "r2".into(),
        kind: CallbackKind::Timeout,
        index: 3,
        source: anyhow!("boom"),
    };
    let msg = err.to_string();
    assert!(msg.contains("timeout callback #3"));
    assert!(msg.contains("r2"));
    assert!(msg.contains("boom"));
    assert!(std::error::Error::source(&err).is_some());
}
