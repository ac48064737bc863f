//! Host runtime: the Tokio runtime plus the reclaim token that tears down every
//! live import session when the host shuts down or the user interrupts it.
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
pub struct GleanerHandle {
    inner: Handle,
    reclaim: CancellationToken,
}

pub struct GleanerRuntime {
    runtime: Runtime,
    reclaim: CancellationToken,
}

impl GleanerRuntime {
    /// Build a multi-threaded runtime for the host.
    ///
    /// ```
    /// use gleaner_runtime::GleanerRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = GleanerRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        Ok(Self {
            runtime,
            reclaim: CancellationToken::new(),
        })
    }

    /// ```
    /// use gleaner_runtime::GleanerRuntime;
    ///
    /// let runtime = GleanerRuntime::build("handle-example", Some(1)).unwrap();
    /// assert!(!runtime.handle().reclaim_token().is_cancelled());
    /// ```
    pub fn handle(&self) -> GleanerHandle {
        GleanerHandle {
            inner: self.runtime.handle().clone(),
            reclaim: self.reclaim.clone(),
        }
    }

    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Reclaim on Ctrl-C. The watcher stops once the token is cancelled by
    /// other means.
    pub fn reclaim_on_interrupt(&self) -> JoinHandle<()> {
        let reclaim = self.reclaim.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = reclaim.cancelled() => {}
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        info!(target: "gleaner.runtime", "interrupt received; reclaiming surfaces");
                        reclaim.cancel();
                    }
                    Err(error) => {
                        warn!(target: "gleaner.runtime", %error, "cannot listen for interrupts");
                    }
                },
            }
        })
    }

    /// Reclaim outstanding sessions and shut the runtime down.
    ///
    /// ```
    /// use gleaner_runtime::GleanerRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = GleanerRuntime::build("shutdown-example", Some(1)).unwrap();
    /// let token = runtime.handle().reclaim_token();
    /// runtime.shutdown(Duration::from_millis(5));
    /// assert!(token.is_cancelled());
    /// ```
    pub fn shutdown(self, graceful: Duration) {
        self.reclaim.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl GleanerHandle {
    /// ```
    /// use gleaner_runtime::GleanerRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = GleanerRuntime::build("handle-doctest", Some(1)).unwrap();
    /// let task = runtime.handle().spawn(async { 21 * 2 });
    /// let result = runtime.block_on(async move { task.await.unwrap() });
    /// assert_eq!(result, 42);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    /// Host-wide reclaim token. Hand it to the bridge so cancelling it tears
    /// down every live session.
    ///
    /// ```
    /// use gleaner_runtime::GleanerRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = GleanerRuntime::build("reclaim-example", Some(1)).unwrap();
    /// let reclaim = runtime.handle().reclaim_token();
    /// let session = reclaim.child_token();
    /// reclaim.cancel();
    /// assert!(session.is_cancelled());
    /// runtime.shutdown(Duration::from_millis(5));
    /// ```
    pub fn reclaim_token(&self) -> CancellationToken {
        self.reclaim.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_watcher_exits_when_reclaimed_elsewhere() {
        let runtime = GleanerRuntime::build("watcher-test", Some(1)).unwrap();
        let watcher = runtime.reclaim_on_interrupt();
        runtime.handle().reclaim_token().cancel();
        runtime.block_on(async move { watcher.await.unwrap() });
        runtime.shutdown(Duration::from_millis(10));
    }

    #[test]
    fn spawned_tasks_observe_reclaim() {
        let runtime = GleanerRuntime::build("observe-test", Some(1)).unwrap();
        let handle = runtime.handle();
        let token = handle.reclaim_token();
        let task = handle.spawn(async move {
            token.cancelled().await;
            "reclaimed"
        });
        handle.reclaim_token().cancel();
        assert_eq!(runtime.block_on(async move { task.await.unwrap() }), "reclaimed");
        runtime.shutdown(Duration::from_millis(10));
    }
}
