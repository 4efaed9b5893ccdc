use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Coalesces rapid calls into one delayed action carrying the latest value.
///
/// Every `schedule` replaces the pending value and restarts the timer. Actions
/// run one at a time: a timer that fires while a previous action is still
/// running waits for it. Dropping the debouncer (or calling `close`) cancels
/// any timer that has not fired yet.
pub struct Debouncer<T> {
    delay: Duration,
    pending: Arc<Mutex<Option<T>>>,
    timer: Mutex<Option<CancellationToken>>,
    running: Arc<tokio::sync::Mutex<()>>,
    teardown: CancellationToken,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
            timer: Mutex::new(None),
            running: Arc::new(tokio::sync::Mutex::new(())),
            teardown: CancellationToken::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.teardown.is_cancelled()
    }

    /// Must be called inside a tokio runtime.
    pub fn schedule<F, Fut>(&self, value: T, action: F)
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.teardown.is_cancelled() {
            return;
        }
        *self.pending.lock() = Some(value);

        let timer = self.teardown.child_token();
        if let Some(previous) = self.timer.lock().replace(timer.clone()) {
            previous.cancel();
        }

        let pending = self.pending.clone();
        let running = self.running.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let _running = running.lock().await;
            // superseded or torn down while the previous action ran
            if timer.is_cancelled() {
                return;
            }
            let Some(value) = pending.lock().take() else {
                return;
            };
            action(value).await;
        });
    }

    /// Permanently stop: no pending or future action will run.
    pub fn close(&self) {
        self.teardown.cancel();
        self.pending.lock().take();
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.teardown.cancel();
    }
}
