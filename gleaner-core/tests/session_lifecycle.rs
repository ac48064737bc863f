mod common;

use common::{bridge_for, fake, spawn_open, until, GUIDE_URL};
use gleaner_common::{BridgeError, LaunchPayload, Outcome, SessionId};
use gleaner_core::testing::FakeDocument;
use gleaner_core::{ImportSession, SessionState, SurfaceLauncher};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn single_slot_queues_the_second_session() {
    let (launcher, mut sessions) = fake(FakeDocument::with_body("one"));
    let bridge = bridge_for(&launcher, 1);

    let first = spawn_open(&bridge, GUIDE_URL);
    let first_surface = sessions.next().await.unwrap();
    let second = spawn_open(&bridge, "https://example.com/second");

    until(|| bridge.pending() == 2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(launcher.launch_count(), 1);
    assert!(sessions.try_next().is_none());

    first_surface.confirm().await;
    assert_eq!(first.await.unwrap().unwrap().text, "one");

    let second_surface = sessions.next().await.unwrap();
    assert_eq!(second_surface.launch_url(), "https://example.com/second");
    second_surface.cancel().await;
    assert_eq!(second.await.unwrap(), Err(BridgeError::UserCancelled));
    assert_eq!(bridge.pending(), 0);
}

#[tokio::test]
async fn separate_slots_settle_independently() {
    let (launcher, mut sessions) = fake(FakeDocument::with_pre("shared"));
    let bridge = bridge_for(&launcher, 2);

    let first = spawn_open(&bridge, "https://example.com/1");
    let second = spawn_open(&bridge, "https://example.com/2");
    let a = sessions.next().await.unwrap();
    let b = sessions.next().await.unwrap();
    assert_ne!(a.session_id(), b.session_id());

    let (cancelled, confirmed) = if a.launch_url().ends_with('1') {
        (a, b)
    } else {
        (b, a)
    };
    cancelled.cancel().await;
    assert_eq!(first.await.unwrap(), Err(BridgeError::UserCancelled));
    assert!(!confirmed.is_closed());

    confirmed.confirm().await;
    assert_eq!(second.await.unwrap().unwrap().text, "shared");
    assert_eq!(cancelled.closes(), 1);
    assert_eq!(confirmed.closes(), 1);
}

#[tokio::test]
async fn reclaim_while_queued_never_launches() {
    let (launcher, mut sessions) = fake(FakeDocument::empty());
    let bridge = bridge_for(&launcher, 1);

    let first = spawn_open(&bridge, GUIDE_URL);
    let surface = sessions.next().await.unwrap();
    let queued = spawn_open(&bridge, GUIDE_URL);
    until(|| bridge.pending() == 2).await;

    bridge.shutdown();
    assert_eq!(first.await.unwrap(), Err(BridgeError::NoData));
    assert_eq!(queued.await.unwrap(), Err(BridgeError::NoData));
    assert_eq!(launcher.launch_count(), 1);
    assert_eq!(surface.closes(), 1);
}

#[tokio::test]
async fn abandoned_call_releases_surface_and_slot() {
    let (launcher, mut sessions) = fake(FakeDocument::with_body("retry"));
    let bridge = bridge_for(&launcher, 1);

    let abandoned = spawn_open(&bridge, GUIDE_URL);
    let first = sessions.next().await.unwrap();
    abandoned.abort();
    assert!(abandoned.await.unwrap_err().is_cancelled());

    until(|| first.is_closed() && bridge.pending() == 0).await;
    assert_eq!(first.closes(), 1);

    let retry = spawn_open(&bridge, GUIDE_URL);
    let second = sessions.next().await.unwrap();
    assert_eq!(launcher.launch_count(), 2);
    second.confirm().await;
    assert_eq!(retry.await.unwrap().unwrap().text, "retry");
}

#[tokio::test]
async fn abandoning_a_queued_call_never_launches_it() {
    let (launcher, mut sessions) = fake(FakeDocument::with_body("first"));
    let bridge = bridge_for(&launcher, 1);

    let first = spawn_open(&bridge, GUIDE_URL);
    let surface = sessions.next().await.unwrap();
    let queued = spawn_open(&bridge, GUIDE_URL);
    until(|| bridge.pending() == 2).await;

    queued.abort();
    let _ = queued.await;
    until(|| bridge.pending() == 1).await;

    surface.confirm().await;
    assert_eq!(first.await.unwrap().unwrap().text, "first");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(launcher.launch_count(), 1);
    assert!(sessions.try_next().is_none());
}

#[tokio::test]
async fn session_runs_directly_against_a_launched_surface() {
    let (launcher, mut sessions) = fake(FakeDocument::with_body("direct"));
    let id = SessionId::new();
    let payload = LaunchPayload {
        url: GUIDE_URL.to_string(),
    };
    let handle = launcher.launch(id, &payload).await.unwrap();
    let surface = sessions.next().await.unwrap();
    assert_eq!(surface.session_id(), id);

    let session = ImportSession::new(id, payload);
    assert_eq!(session.state(), SessionState::Launched);
    assert_eq!(session.id(), id);

    let run = tokio::spawn(session.run(handle, CancellationToken::new()));
    surface.confirm().await;
    let result = run.await.unwrap();

    assert_eq!(result.outcome, Outcome::Ok);
    assert_eq!(result.text, "direct");
    assert_eq!(surface.closes(), 1);
}

#[tokio::test]
async fn aborted_session_still_closes_its_surface() {
    let (launcher, mut sessions) = fake(FakeDocument::empty());
    let id = SessionId::new();
    let payload = LaunchPayload {
        url: GUIDE_URL.to_string(),
    };
    let handle = launcher.launch(id, &payload).await.unwrap();
    let surface = sessions.next().await.unwrap();

    let run = tokio::spawn(ImportSession::new(id, payload).run(handle, CancellationToken::new()));
    until(|| !surface.navigations().is_empty()).await;
    run.abort();
    let _ = run.await;

    until(|| surface.is_closed()).await;
    assert_eq!(surface.closes(), 1);
}

#[tokio::test]
async fn reclaim_token_cancels_a_direct_session() {
    let (launcher, mut sessions) = fake(FakeDocument::with_body("x"));
    let launcher = launcher.hold_navigation();
    let id = SessionId::new();
    let payload = LaunchPayload {
        url: GUIDE_URL.to_string(),
    };
    let handle = launcher.launch(id, &payload).await.unwrap();
    let surface = sessions.next().await.unwrap();

    let reclaim = CancellationToken::new();
    let run = tokio::spawn(ImportSession::new(id, payload).run(handle, reclaim.clone()));
    reclaim.cancel();

    let result = run.await.unwrap();
    assert_eq!(result.outcome, Outcome::Failed);
    assert!(result.text.is_empty());
    assert!(surface.is_closed());
}
