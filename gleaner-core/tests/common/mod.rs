use gleaner_common::{ImportRequest, OkPayload, Result};
use gleaner_core::testing::{FakeDocument, FakeLauncher, FakeSessions};
use gleaner_core::{BridgeOptions, ImportBridge};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const GUIDE_URL: &str = "https://gamefaqs.gamespot.com/pc/123/faqs/456?print=1";

pub fn bridge_for(launcher: &FakeLauncher, slots: usize) -> Arc<ImportBridge> {
    Arc::new(ImportBridge::new(
        Arc::new(launcher.clone()),
        BridgeOptions {
            max_concurrent_sessions: slots,
        },
    ))
}

pub fn fake(document: FakeDocument) -> (FakeLauncher, FakeSessions) {
    FakeLauncher::new(document)
}

pub fn spawn_open(bridge: &Arc<ImportBridge>, url: &str) -> JoinHandle<Result<OkPayload>> {
    let bridge = Arc::clone(bridge);
    let request = ImportRequest::new(url);
    tokio::spawn(async move { bridge.open(request).await })
}

/// Poll `cond` until it holds, failing the test after a few seconds.
pub async fn until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
