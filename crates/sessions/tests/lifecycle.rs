//! Integration tests: creation, pairing, status projection, sending and
//! disconnection against the scripted in-memory driver.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use wg_sessions::testing::{Script, ScriptedDriver, SentMessage};
use wg_sessions::{CreateOutcome, ManagerSettings, SessionError, SessionManager, SessionStatus};

// ── Helpers ─────────────────────────────────────────────────────────────

fn manager() -> (Arc<ScriptedDriver>, SessionManager) {
    let driver = Arc::new(ScriptedDriver::new());
    let mgr = SessionManager::new(driver.clone(), ManagerSettings::default());
    (driver, mgr)
}

async fn wait_for_status(mgr: &SessionManager, session: &str, want: Option<SessionStatus>) {
    let reached = tokio::time::timeout(Duration::from_secs(2), async {
        while mgr.session_status(session) != want {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(
        reached.is_ok(),
        "{session} never reached {want:?}, stuck at {:?}",
        mgr.session_status(session)
    );
}

/// Create a session whose credentials are already on disk.
async fn connected(driver: &ScriptedDriver, mgr: &SessionManager, session: &str, script: Script) {
    driver.script(session, script);
    let created = mgr.create_session("co", Some(session)).await.unwrap();
    assert_eq!(created.outcome, CreateOutcome::AlreadyAuthenticated);
}

// ── Creation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn qr_first_then_scan_converges_to_connected() {
    let (driver, mgr) = manager();
    let scanned = Arc::new(Notify::new());
    driver.script(
        "company_co1",
        Script::new().qr("QRDATA").wait(scanned.clone()).ready(),
    );

    let created = mgr.create_session("co1", None).await.unwrap();
    assert_eq!(created.session_name, "company_co1");
    assert_eq!(created.qr_code(), Some("QRDATA"));

    assert_eq!(mgr.session_status("company_co1"), Some(SessionStatus::QrReady));
    assert!(!mgr.is_session_connected("company_co1"));
    assert!(mgr.list_sessions().is_empty());
    let rows = mgr.list_sessions_with_status();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].has_driver_handle);
    assert_eq!(rows[0].company_id.as_deref(), Some("co1"));

    scanned.notify_one();
    wait_for_status(&mgr, "company_co1", Some(SessionStatus::Connected)).await;

    assert!(mgr.is_session_connected("company_co1"));
    assert_eq!(mgr.list_sessions(), vec!["company_co1".to_string()]);
    // Stale QR stays retrievable after connecting.
    assert_eq!(mgr.qr_code("company_co1").unwrap().as_deref(), Some("QRDATA"));
}

#[tokio::test]
async fn pre_authenticated_session_returns_without_qr() {
    let (driver, mgr) = manager();
    driver.script("company_7", Script::new().status("isLogged").ready());

    let created = mgr.create_session("7", None).await.unwrap();
    assert_eq!(created.outcome, CreateOutcome::AlreadyAuthenticated);
    assert_eq!(created.qr_code(), None);
    assert_eq!(mgr.session_status("company_7"), Some(SessionStatus::Connected));
    assert_eq!(mgr.qr_code("company_7").unwrap(), None);
}

#[tokio::test]
async fn creation_passes_configured_launch_options() {
    let (driver, mgr) = manager();
    connected(&driver, &mgr, "s1", Script::new().ready()).await;

    let requests = driver.create_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].session_name, "s1");
    assert_eq!(requests[0].inactivity_timeout, Duration::from_secs(60));
    assert!(requests[0].launch.headless);
    assert_eq!(requests[0].launch, mgr.settings().launch);
}

#[tokio::test]
async fn rejected_creation_leaves_no_entry() {
    let (driver, mgr) = manager();
    driver.script(
        "company_9",
        Script::new().status("notLogged").fail("net::ERR_CONNECTION_RESET"),
    );

    let err = mgr.create_session("9", None).await.unwrap_err();
    match err {
        SessionError::Creation { session, message } => {
            assert_eq!(session, "company_9");
            assert!(message.contains("ERR_CONNECTION_RESET"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(mgr.session_status("company_9"), None);
    assert!(mgr.list_sessions_with_status().is_empty());
}

#[tokio::test]
async fn creating_a_connected_session_fails_fast() {
    let (driver, mgr) = manager();
    connected(&driver, &mgr, "s1", Script::new().ready()).await;

    let err = mgr.create_session("co", Some("s1")).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyConnected(ref s) if s == "s1"));
    assert_eq!(driver.create_calls().len(), 1);
}

#[tokio::test]
async fn newer_creation_owns_the_slot() {
    let (driver, mgr) = manager();
    let first_scan = Arc::new(Notify::new());
    let second_scan = Arc::new(Notify::new());
    driver
        .script("dup", Script::new().qr("A").wait(first_scan.clone()).ready())
        .script("dup", Script::new().qr("B").wait(second_scan.clone()).ready());

    let first = mgr.create_session("co", Some("dup")).await.unwrap();
    let second = mgr.create_session("co", Some("dup")).await.unwrap();
    assert_eq!(first.qr_code(), Some("A"));
    assert_eq!(second.qr_code(), Some("B"));

    // The superseded attempt was abandoned and cannot attach.
    first_scan.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(mgr.session_status("dup"), Some(SessionStatus::QrReady));
    assert!(mgr.list_sessions().is_empty());

    second_scan.notify_one();
    wait_for_status(&mgr, "dup", Some(SessionStatus::Connected)).await;
    assert_eq!(mgr.list_sessions(), vec!["dup".to_string()]);
    assert_eq!(mgr.qr_code("dup").unwrap().as_deref(), Some("B"));
}

#[tokio::test]
async fn every_qr_overwrites_the_stored_code() {
    let (driver, mgr) = manager();
    let refreshed = Arc::new(Notify::new());
    driver.script(
        "s1",
        Script::new()
            .qr("first")
            .wait(refreshed.clone())
            .qr("second")
            .hang(),
    );

    let created = mgr.create_session("co", Some("s1")).await.unwrap();
    assert_eq!(created.qr_code(), Some("first"));

    refreshed.notify_one();
    let updated = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if mgr.qr_code("s1").unwrap().as_deref() == Some("second") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(updated.is_ok());
}

// ── QR retrieval ────────────────────────────────────────────────────────

#[tokio::test]
async fn qr_for_unknown_session_is_unavailable() {
    let (_driver, mgr) = manager();
    let err = mgr.qr_code("neverSeen").unwrap_err();
    assert!(matches!(err, SessionError::QrUnavailable(ref s) if s == "neverSeen"));
}

// ── Sending ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_normalizes_local_number() {
    let (driver, mgr) = manager();
    connected(&driver, &mgr, "s1", Script::new().ready()).await;

    let delivery = mgr.send_message("s1", "11987654321", "hi").await.unwrap();
    assert_eq!(delivery.session_name, "s1");
    assert_eq!(delivery.to, "5511987654321@c.us");
    assert_eq!(
        driver.sent(),
        vec![SentMessage {
            session: "s1".into(),
            to: "5511987654321@c.us".into(),
            text: "hi".into(),
        }]
    );
}

#[tokio::test]
async fn send_rejects_short_number() {
    let (driver, mgr) = manager();
    connected(&driver, &mgr, "s1", Script::new().ready()).await;

    let err = mgr.send_message("s1", "123", "hi").await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidPhoneNumber { digits: 3, .. }));
    assert!(driver.sent().is_empty());
}

#[tokio::test]
async fn send_requires_connected_status() {
    let (driver, mgr) = manager();
    connected(
        &driver,
        &mgr,
        "s1",
        Script::new()
            .ready()
            .sleep(Duration::from_millis(20))
            .status("phoneNotConnected"),
    )
    .await;
    wait_for_status(&mgr, "s1", Some(SessionStatus::Disconnected)).await;

    let err = mgr.send_message("s1", "11987654321", "hi").await.unwrap_err();
    match err {
        SessionError::NotConnected { session, status } => {
            assert_eq!(session, "s1");
            assert_eq!(status, "DISCONNECTED");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(driver.sent().is_empty());
}

#[tokio::test]
async fn driver_send_rejection_is_wrapped() {
    let (driver, mgr) = manager();
    connected(&driver, &mgr, "s1", Script::new().ready().send_error("chat not found")).await;

    let err = mgr.send_message("s1", "5511987654321", "hi").await.unwrap_err();
    assert!(matches!(err, SessionError::SendFailure(ref m) if m.contains("chat not found")));
}

// ── Driver stream ending ────────────────────────────────────────────────

#[tokio::test]
async fn driver_exit_after_attach_detaches_the_handle() {
    let (driver, mgr) = manager();
    connected(
        &driver,
        &mgr,
        "s1",
        Script::new().ready().sleep(Duration::from_millis(10)).close(),
    )
    .await;

    wait_for_status(&mgr, "s1", Some(SessionStatus::Disconnected)).await;
    assert!(mgr.list_sessions().is_empty());
    assert!(!mgr.list_sessions_with_status()[0].has_driver_handle);

    // Nothing is wedged: sending recovers through a fresh driver session.
    driver.script("s1", Script::new().status("isLogged").ready());
    let delivery = mgr.send_message("s1", "11987654321", "still there?").await.unwrap();
    assert_eq!(delivery.session_name, "s1");
    assert_eq!(driver.create_calls().len(), 2);
    assert!(mgr.is_session_connected("s1"));
}

#[tokio::test]
async fn detached_session_can_be_created_again() {
    let (driver, mgr) = manager();
    connected(&driver, &mgr, "s1", Script::new().ready().close()).await;
    wait_for_status(&mgr, "s1", Some(SessionStatus::Disconnected)).await;

    // No handle left, so disconnecting is a no-op rather than a failed logout.
    mgr.disconnect_session("s1").await.unwrap();
    assert!(driver.logouts().is_empty());

    driver.script("s1", Script::new().qr("AGAIN").hang());
    let created = mgr.create_session("co", Some("s1")).await.unwrap();
    assert_eq!(created.qr_code(), Some("AGAIN"));
}

#[tokio::test]
async fn failed_recreate_keeps_the_live_session_streaming() {
    let (driver, mgr) = manager();
    let phone_back = Arc::new(Notify::new());
    connected(
        &driver,
        &mgr,
        "s1",
        Script::new()
            .ready()
            .status("phoneNotConnected")
            .wait(phone_back.clone())
            .status("isLogged"),
    )
    .await;
    wait_for_status(&mgr, "s1", Some(SessionStatus::Disconnected)).await;

    // The live browser still holds the profile.
    driver.script("s1", Script::new().profile_in_use("browser is already running"));
    let err = mgr.create_session("co", Some("s1")).await.unwrap_err();
    assert!(matches!(err, SessionError::Creation { .. }));
    assert_eq!(mgr.list_sessions(), vec!["s1".to_string()]);

    phone_back.notify_one();
    wait_for_status(&mgr, "s1", Some(SessionStatus::Connected)).await;
    mgr.send_message("s1", "11987654321", "hi").await.unwrap();
    assert_eq!(driver.create_calls().len(), 2);
}

// ── Disconnecting ───────────────────────────────────────────────────────

#[tokio::test]
async fn disconnect_removes_every_trace() {
    let (driver, mgr) = manager();
    connected(&driver, &mgr, "s1", Script::new().ready()).await;

    mgr.disconnect_session("s1").await.unwrap();
    assert_eq!(mgr.session_status("s1"), None);
    assert!(mgr.list_sessions().is_empty());
    assert!(mgr.list_sessions_with_status().is_empty());
    assert_eq!(driver.logouts(), vec!["s1".to_string()]);
}

#[tokio::test]
async fn failed_logout_leaves_state_untouched() {
    let (driver, mgr) = manager();
    let scanned = Arc::new(Notify::new());
    driver.script(
        "s1",
        Script::new()
            .qr("QR")
            .wait(scanned.clone())
            .ready()
            .logout_error("page crashed"),
    );
    mgr.create_session("co", Some("s1")).await.unwrap();
    scanned.notify_one();
    wait_for_status(&mgr, "s1", Some(SessionStatus::Connected)).await;

    let before = mgr.list_sessions_with_status();
    let err = mgr.disconnect_session("s1").await.unwrap_err();
    assert!(matches!(err, SessionError::LogoutFailure { ref message, .. } if message.contains("page crashed")));

    assert_eq!(mgr.list_sessions_with_status(), before);
    assert_eq!(mgr.qr_code("s1").unwrap().as_deref(), Some("QR"));
    assert_eq!(mgr.list_sessions(), vec!["s1".to_string()]);
    assert!(driver.logouts().is_empty());
}

#[tokio::test]
async fn disconnect_without_handle_is_a_no_op() {
    let (driver, mgr) = manager();
    mgr.disconnect_session("ghost").await.unwrap();
    assert!(driver.logouts().is_empty());
}

#[tokio::test]
async fn late_driver_events_cannot_resurrect_a_disconnected_session() {
    let (driver, mgr) = manager();
    connected(
        &driver,
        &mgr,
        "s1",
        Script::new()
            .ready()
            .sleep(Duration::from_millis(30))
            .status("notLogged"),
    )
    .await;

    mgr.disconnect_session("s1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(mgr.session_status("s1"), None);
    assert!(mgr.list_sessions_with_status().is_empty());
}

#[tokio::test]
async fn shutdown_keeps_sessions_logged_in() {
    let (driver, mgr) = manager();
    connected(&driver, &mgr, "s1", Script::new().ready()).await;

    mgr.shutdown();
    assert_eq!(mgr.session_status("s1"), Some(SessionStatus::Connected));
    assert!(driver.logouts().is_empty());
}
