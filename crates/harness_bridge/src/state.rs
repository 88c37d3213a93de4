use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::PromptError;
use crate::listeners::Listeners;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    Error,
}

/// Connection status of one harness instance.
///
/// [`ConnectionStateMachine::transition`] is the only writer. Every call notifies listeners
/// once, including when the requested state equals the current one.
#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    listeners: Listeners<ConnectionState>,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn on_change(&mut self, callback: impl FnMut(&ConnectionState) + Send + 'static) {
        self.listeners.add(callback);
    }

    pub fn transition(&mut self, next: ConnectionState) {
        debug!(from = ?self.state, to = ?next, "harness connection transition");
        self.state = next;
        self.listeners.emit(&next);
    }
}

/// Guarantees at most one prompt in flight per harness instance.
#[derive(Debug, Default)]
pub struct PromptGuard {
    in_flight: AtomicBool,
}

/// Marks a prompt as in flight until dropped.
#[derive(Debug)]
pub struct PromptPermit<'a> {
    guard: &'a PromptGuard,
}

impl Drop for PromptPermit<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
        debug!("prompt finished");
    }
}

impl PromptGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claims the prompt slot, or returns `None` when another prompt holds it.
    pub fn try_begin(&self) -> Option<PromptPermit<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        debug!("prompt started");
        Some(PromptPermit { guard: self })
    }

    /// Runs `work` as the single in-flight prompt.
    ///
    /// The slot is claimed before `work` is called, so a rejected prompt never starts. It is
    /// released when the work resolves, fails, or is dropped mid-flight.
    pub async fn run<F, Fut, T, E>(&self, work: F) -> Result<T, PromptError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(_permit) = self.try_begin() else {
            return Err(PromptError::InProgress);
        };
        work().await.map_err(PromptError::Work)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    use tokio::sync::oneshot;

    use super::*;

    #[test]
    fn every_transition_is_reported() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut machine = ConnectionStateMachine::new();
        let sink = Arc::clone(&seen);
        machine.on_change(move |state| sink.lock().unwrap().push(*state));

        assert_eq!(machine.state(), ConnectionState::Disconnected);
        machine.transition(ConnectionState::Connected);
        machine.transition(ConnectionState::Connected);
        machine.transition(ConnectionState::Disconnected);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ConnectionState::Connected,
                ConnectionState::Connected,
                ConnectionState::Disconnected
            ]
        );
        assert!(!machine.is_connected());
    }

    #[tokio::test]
    async fn overlapping_prompt_is_rejected_without_running() {
        let guard = PromptGuard::new();
        let second_started = AtomicUsize::new(0);
        let (release, released) = oneshot::channel::<()>();

        let first = guard.run(|| async move {
            released.await.map_err(|_| "sender dropped")?;
            Ok::<_, &'static str>("first")
        });
        let second = async {
            let outcome = guard
                .run(|| async {
                    second_started.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, &'static str>("second")
                })
                .await;
            let _ = release.send(());
            outcome
        };

        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.unwrap(), "first");
        assert!(second.unwrap_err().is_in_progress());
        assert_eq!(second_started.load(Ordering::SeqCst), 0);
        assert!(!guard.is_busy());
    }

    #[tokio::test]
    async fn failure_releases_the_slot() {
        let guard = PromptGuard::new();
        let failed = guard
            .run(|| async { Err::<(), _>("boom") })
            .await
            .unwrap_err();
        assert_eq!(failed.into_work(), Some("boom"));
        assert!(!guard.is_busy());

        let ok = guard.run(|| async { Ok::<_, &'static str>(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[test]
    fn guards_are_per_instance() {
        let parent = PromptGuard::new();
        let child = PromptGuard::new();

        let _held = parent.try_begin().unwrap();
        assert!(parent.try_begin().is_none());
        assert!(child.try_begin().is_some());
    }

    #[test]
    fn dropping_permit_frees_the_slot() {
        let guard = PromptGuard::new();
        {
            let _permit = guard.try_begin().unwrap();
            assert!(guard.is_busy());
        }
        assert!(!guard.is_busy());
    }
}
