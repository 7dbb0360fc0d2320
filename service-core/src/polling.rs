//! Periodic refresh of remote data.
//!
//! A [`PeriodicRefresh`] owns a background task that calls a fetch operation
//! on a fixed interval and keeps the latest successful value. Dropping the
//! handle stops the task.

use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Latest state of a refreshed value.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub value: Option<T>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            value: None,
            refreshed_at: None,
            last_error: None,
        }
    }
}

pub struct PeriodicRefresh<T> {
    receiver: watch::Receiver<Snapshot<T>>,
    task: JoinHandle<()>,
}

impl<T> PeriodicRefresh<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start polling. The first fetch runs immediately; a failed fetch keeps
    /// the previous value and records the error.
    pub fn spawn<F, Fut, E>(name: &'static str, interval: Duration, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (sender, receiver) = watch::channel(Snapshot::default());

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match fetch().await {
                    Ok(value) => {
                        tracing::debug!(refresh = name, "Refreshed");
                        sender.send_modify(|snapshot| {
                            snapshot.value = Some(value);
                            snapshot.refreshed_at = Some(Utc::now());
                            snapshot.last_error = None;
                        });
                    }
                    Err(e) => {
                        tracing::warn!(refresh = name, error = %e, "Refresh failed");
                        sender.send_modify(|snapshot| {
                            snapshot.last_error = Some(e.to_string());
                        });
                    }
                }
            }
        });

        Self { receiver, task }
    }

    /// Most recent successfully fetched value.
    pub fn current(&self) -> Option<T> {
        self.receiver.borrow().value.clone()
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.receiver.borrow().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.receiver.borrow().last_error.clone()
    }

    /// Receiver that is notified on every refresh attempt.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.receiver.clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T> Drop for PeriodicRefresh<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn wait_for<T: Clone>(
        receiver: &mut watch::Receiver<Snapshot<T>>,
        predicate: impl Fn(&Snapshot<T>) -> bool,
    ) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if predicate(&*receiver.borrow()) {
                    return;
                }
                receiver.changed().await.unwrap();
            }
        })
        .await
        .expect("refresh did not reach expected state");
    }

    #[tokio::test]
    async fn keeps_latest_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let refresh = PeriodicRefresh::spawn("counter", Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move { Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst) + 1) }
        });

        let mut receiver = refresh.subscribe();
        wait_for(&mut receiver, |s| s.value.unwrap_or(0) >= 3).await;

        assert!(refresh.current().unwrap() >= 3);
        assert!(refresh.last_error().is_none());
    }

    #[tokio::test]
    async fn failure_keeps_previous_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let refresh = PeriodicRefresh::spawn("flaky", Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => Ok(vec!["first".to_string()]),
                    _ => Err("backend unavailable"),
                }
            }
        });

        let mut receiver = refresh.subscribe();
        wait_for(&mut receiver, |s| s.last_error.is_some()).await;

        assert_eq!(refresh.current(), Some(vec!["first".to_string()]));
        assert_eq!(refresh.last_error().as_deref(), Some("backend unavailable"));
    }

    #[tokio::test]
    async fn stop_ends_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let refresh = PeriodicRefresh::spawn("stopped", Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move { Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst)) }
        });

        let mut receiver = refresh.subscribe();
        wait_for(&mut receiver, |s| s.value.is_some()).await;
        refresh.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(refresh.is_stopped());

        let seen = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }
}
