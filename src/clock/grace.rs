use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Single-slot, cancellable delayed action.
///
/// Arming while already armed replaces the earlier timer.
pub struct GraceTimer {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl GraceTimer {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    /// Runs `on_fire` once `delay` has elapsed unless cancelled first.
    pub fn arm<F>(&mut self, delay: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_armed() {
            debug!("Replacing armed grace timer");
        }
        self.cancel();

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => on_fire.await,
                _ = token_clone.cancelled() => {}
            }
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Drops the bookkeeping for a timer that has already fired.
    pub fn clear_fired(&mut self) {
        if !self.is_armed() {
            self.handle = None;
            self.cancel_token = None;
        }
    }
}

impl Default for GraceTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GraceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn counting(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = GraceTimer::new();
        timer.arm(Duration::from_secs(300), counting(&fired));

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        timer.clear_fired();
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = GraceTimer::new();
        timer.arm(Duration::from_secs(300), counting(&fired));
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_previous_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = GraceTimer::new();
        timer.arm(Duration::from_secs(100), counting(&fired));
        timer.arm(Duration::from_secs(300), counting(&fired));

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
