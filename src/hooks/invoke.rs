//! Calling-convention adapter shared by both chain runners.
//!
//! # Responsibilities
//! - Hand each hook a completion callback (`Done`)
//! - Reduce "returned", "called back" and "returned a future" to one
//!   `HookOutcome` the driver loop can consume
//!
//! # Design Decisions
//! - A callback that already fired wins over whatever the hook returned
//! - The first completion wins; later ones are logged and dropped
//! - A hook that returns without calling back and without keeping the
//!   callback alive has completed synchronously

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::hooks::HookError;

/// Result of a single hook: `Some` replaces the threaded value, `None` keeps it.
pub type HookOutcome<T> = Result<Option<T>, HookError>;

/// What a hook invocation handed back to the runner.
pub enum Invocation<'a, T> {
    /// Plain return. Success, unless the hook kept its callback to finish later.
    Returned,
    /// A future the runner awaits unless the callback fires first.
    Pending(BoxFuture<'a, HookOutcome<T>>),
}

impl<T> std::fmt::Debug for Invocation<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invocation::Returned => f.write_str("Returned"),
            Invocation::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Error-first completion callback given to every hook.
///
/// Clones share one slot. Only the first call is delivered.
pub struct Done<T> {
    slot: Arc<Mutex<Option<oneshot::Sender<HookOutcome<T>>>>>,
}

impl<T> Clone for Done<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> std::fmt::Debug for Done<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Done").finish_non_exhaustive()
    }
}

impl<T> Done<T> {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<HookOutcome<T>>) {
        let (tx, rx) = oneshot::channel();
        let done = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (done, rx)
    }

    /// Deliver the outcome. Returns `false` if this hook already completed.
    pub fn complete(&self, outcome: HookOutcome<T>) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(tx) => {
                // The runner may have moved on (error already returned); nothing to do then.
                let _ = tx.send(outcome);
                true
            }
            None => {
                tracing::warn!(
                    failed = outcome.is_err(),
                    "Hook completion callback invoked more than once, ignoring"
                );
                false
            }
        }
    }

    /// Complete successfully without replacing the threaded value.
    pub fn ok(&self) -> bool {
        self.complete(Ok(None))
    }

    /// Complete with an error.
    pub fn fail(&self, error: HookError) -> bool {
        self.complete(Err(error))
    }

    /// Complete successfully and replace the threaded value.
    pub fn replace(&self, value: T) -> bool {
        self.complete(Ok(Some(value)))
    }
}

/// Resolve one invocation to its outcome.
pub(crate) async fn settle<T>(
    index: usize,
    invoked: Result<Invocation<'_, T>, HookError>,
    mut rx: oneshot::Receiver<HookOutcome<T>>,
) -> HookOutcome<T> {
    match rx.try_recv() {
        Ok(outcome) => return outcome,
        Err(TryRecvError::Closed) => {
            // Every callback handle is gone uncalled: the return value decides.
            return match invoked? {
                Invocation::Returned => Ok(None),
                Invocation::Pending(future) => future.await,
            };
        }
        Err(TryRecvError::Empty) => {}
    }

    match invoked? {
        Invocation::Returned => match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(HookError::callback_dropped(index)),
        },
        Invocation::Pending(mut future) => {
            tokio::select! {
                biased;
                called = &mut rx => match called {
                    Ok(outcome) => outcome,
                    Err(_) => future.await,
                },
                resolved = &mut future => resolved,
            }
        }
    }
}
