//! Generic sequential hook runner.
//!
//! # Responsibilities
//! - Run hooks one at a time in registration order
//! - Stop at the first failure and report it once
//!
//! # Design Decisions
//! - The hook list is an `Arc<Vec<_>>` snapshotted when a run starts;
//!   `push` is copy-on-write, so registrations never touch an in-flight run
//! - The driver is a plain loop, so chain length never grows the stack

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::hooks::invoke::{settle, Done, Invocation};
use crate::hooks::HookError;

/// An extension point invoked with the request-scoped state.
pub trait Hook<S>: Send + Sync {
    /// Start the hook. Returning `Err` counts as a synchronous failure.
    fn invoke<'a>(
        &'a self,
        state: &'a mut S,
        done: Done<()>,
    ) -> Result<Invocation<'a, ()>, HookError>;
}

struct SyncHook<F>(F);

impl<S, F> Hook<S> for SyncHook<F>
where
    F: Fn(&mut S) -> Result<(), HookError> + Send + Sync,
{
    fn invoke<'a>(
        &'a self,
        state: &'a mut S,
        _done: Done<()>,
    ) -> Result<Invocation<'a, ()>, HookError> {
        (self.0)(state)?;
        Ok(Invocation::Returned)
    }
}

struct CallbackHook<F>(F);

impl<S, F> Hook<S> for CallbackHook<F>
where
    F: Fn(&mut S, Done<()>) + Send + Sync,
{
    fn invoke<'a>(
        &'a self,
        state: &'a mut S,
        done: Done<()>,
    ) -> Result<Invocation<'a, ()>, HookError> {
        (self.0)(state, done);
        Ok(Invocation::Returned)
    }
}

struct AsyncHook<F>(F);

impl<S, F> Hook<S> for AsyncHook<F>
where
    F: for<'a> Fn(&'a mut S) -> BoxFuture<'a, Result<(), HookError>> + Send + Sync,
{
    fn invoke<'a>(
        &'a self,
        state: &'a mut S,
        _done: Done<()>,
    ) -> Result<Invocation<'a, ()>, HookError> {
        let future = (self.0)(state);
        Ok(Invocation::Pending(Box::pin(async move {
            future.await.map(|()| None)
        })))
    }
}

/// Ordered list of hooks sharing one state type.
pub struct HookChain<S> {
    hooks: Arc<Vec<Arc<dyn Hook<S>>>>,
}

impl<S> Clone for HookChain<S> {
    fn clone(&self) -> Self {
        Self {
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<S> Default for HookChain<S> {
    fn default() -> Self {
        Self {
            hooks: Arc::new(Vec::new()),
        }
    }
}

impl<S> std::fmt::Debug for HookChain<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("len", &self.hooks.len())
            .finish()
    }
}

impl<S: Send + 'static> HookChain<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any hook implementation.
    pub fn add<H: Hook<S> + 'static>(&mut self, hook: H) -> &mut Self {
        Arc::make_mut(&mut self.hooks).push(Arc::new(hook));
        self
    }

    /// Append a hook that finishes when it returns.
    pub fn add_sync<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut S) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.add(SyncHook(hook))
    }

    /// Append a hook that finishes by calling its `Done` handle.
    pub fn add_callback<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut S, Done<()>) + Send + Sync + 'static,
    {
        self.add(CallbackHook(hook))
    }

    /// Append a hook that finishes when its future resolves.
    pub fn add_async<F>(&mut self, hook: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut S) -> BoxFuture<'a, Result<(), HookError>> + Send + Sync + 'static,
    {
        self.add(AsyncHook(hook))
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in order against `state`.
    pub async fn run(&self, state: &mut S) -> Result<(), HookError> {
        let hooks = Arc::clone(&self.hooks);

        for (index, hook) in hooks.iter().enumerate() {
            let (done, rx) = Done::channel();
            let invoked = hook.invoke(&mut *state, done);

            if let Err(error) = settle(index, invoked, rx).await {
                tracing::debug!(hook = index, total = hooks.len(), error = %error, "Hook chain interrupted");
                return Err(error);
            }
        }

        Ok(())
    }

    /// Run the chain and report through a completion callback, called exactly once.
    pub async fn run_with<F>(&self, state: &mut S, on_done: F)
    where
        F: FnOnce(Option<HookError>, &mut S),
    {
        let result = self.run(state).await;
        on_done(result.err(), state);
    }
}
