use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Loading flag and last-update bookkeeping for the threat database.
///
/// At most one refresh holds the [`LoadingGuard`] at a time; dropping the
/// guard clears the flag and wakes every waiter, whether the refresh
/// finished, failed or was cancelled.
#[derive(Debug)]
pub struct RefreshState {
    loading: watch::Sender<bool>,
    // epoch millis, 0 = never
    last_update: AtomicU64,
}

#[derive(Debug)]
pub struct LoadingGuard<'a> {
    state: &'a RefreshState,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.loading.send_replace(false);
    }
}

impl RefreshState {
    pub fn new() -> Self {
        let (loading, _rx) = watch::channel(false);
        Self {
            loading,
            last_update: AtomicU64::new(0),
        }
    }

    /// Claims the loading flag, or returns `None` if a refresh is already running.
    pub fn try_begin(&self) -> Option<LoadingGuard<'_>> {
        let claimed = self.loading.send_if_modified(|loading| {
            if *loading {
                false
            } else {
                *loading = true;
                true
            }
        });
        claimed.then_some(LoadingGuard { state: self })
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Waits until no refresh is running. Returns `false` if `limit` elapsed first.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let mut rx = self.loading.subscribe();
        let idle = matches!(
            tokio::time::timeout(limit, rx.wait_for(|loading| !*loading)).await,
            Ok(Ok(_))
        );
        idle
    }

    pub fn mark_updated(&self, epoch_millis: u64) {
        self.last_update.store(epoch_millis, Ordering::Release);
    }

    pub fn last_update(&self) -> Option<u64> {
        match self.last_update.load(Ordering::Acquire) {
            0 => None,
            ms => Some(ms),
        }
    }
}

impl Default for RefreshState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_exclusive() {
        let state = RefreshState::new();
        let guard = state.try_begin();
        assert!(guard.is_some());
        assert!(state.is_loading());
        assert!(state.try_begin().is_none());

        drop(guard);
        assert!(!state.is_loading());
        assert!(state.try_begin().is_some());
    }

    #[tokio::test]
    async fn test_wait_idle_is_bounded() {
        let state = RefreshState::new();
        assert!(state.wait_idle(Duration::from_millis(10)).await);

        let _guard = state.try_begin().unwrap();
        assert!(!state.wait_idle(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_wait_idle_wakes_on_release() {
        let state = std::sync::Arc::new(RefreshState::new());
        let guard_state = state.clone();

        let holder = tokio::spawn(async move {
            let _guard = guard_state.try_begin().unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;
        });
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(state.wait_idle(Duration::from_secs(5)).await);
        holder.await.unwrap();
    }
}
