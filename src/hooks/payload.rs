//! Payload-threading hook runner for the send stage.
//!
//! # Responsibilities
//! - Same ordering and short-circuit rules as [`HookChain`](super::HookChain)
//! - Thread a payload through the hooks; each may replace it
//!
//! # Design Decisions
//! - `None` from a hook means "keep the current payload", never "empty it"
//! - On failure the caller still gets the last payload a hook produced

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::hooks::invoke::{settle, Done, Invocation};
use crate::hooks::HookError;

/// A send-stage hook: sees the reply state and the current payload.
pub trait PayloadHook<R, P>: Send + Sync {
    fn invoke<'a>(
        &'a self,
        reply: &'a mut R,
        payload: &'a P,
        done: Done<P>,
    ) -> Result<Invocation<'a, P>, HookError>;
}

/// A payload chain stopped by a hook failure.
#[derive(Debug)]
pub struct Interrupted<P> {
    pub error: HookError,
    /// Last payload successfully produced before the failure.
    pub payload: P,
}

struct SyncPayloadHook<F>(F);

impl<R, P, F> PayloadHook<R, P> for SyncPayloadHook<F>
where
    F: Fn(&mut R, &P) -> Result<Option<P>, HookError> + Send + Sync,
    P: Send + 'static,
{
    fn invoke<'a>(
        &'a self,
        reply: &'a mut R,
        payload: &'a P,
        done: Done<P>,
    ) -> Result<Invocation<'a, P>, HookError> {
        if let Some(next) = (self.0)(reply, payload)? {
            done.replace(next);
        }
        Ok(Invocation::Returned)
    }
}

struct CallbackPayloadHook<F>(F);

impl<R, P, F> PayloadHook<R, P> for CallbackPayloadHook<F>
where
    F: Fn(&mut R, &P, Done<P>) + Send + Sync,
{
    fn invoke<'a>(
        &'a self,
        reply: &'a mut R,
        payload: &'a P,
        done: Done<P>,
    ) -> Result<Invocation<'a, P>, HookError> {
        (self.0)(reply, payload, done);
        Ok(Invocation::Returned)
    }
}

struct AsyncPayloadHook<F>(F);

impl<R, P, F> PayloadHook<R, P> for AsyncPayloadHook<F>
where
    F: for<'a> Fn(&'a mut R, &'a P) -> BoxFuture<'a, Result<Option<P>, HookError>> + Send + Sync,
{
    fn invoke<'a>(
        &'a self,
        reply: &'a mut R,
        payload: &'a P,
        _done: Done<P>,
    ) -> Result<Invocation<'a, P>, HookError> {
        Ok(Invocation::Pending((self.0)(reply, payload)))
    }
}

/// Ordered send-stage hooks threading a payload of type `P`.
pub struct PayloadHookChain<R, P> {
    hooks: Arc<Vec<Arc<dyn PayloadHook<R, P>>>>,
}

impl<R, P> Clone for PayloadHookChain<R, P> {
    fn clone(&self) -> Self {
        Self {
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<R, P> Default for PayloadHookChain<R, P> {
    fn default() -> Self {
        Self {
            hooks: Arc::new(Vec::new()),
        }
    }
}

impl<R, P> std::fmt::Debug for PayloadHookChain<R, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadHookChain")
            .field("len", &self.hooks.len())
            .finish()
    }
}

impl<R, P> PayloadHookChain<R, P>
where
    R: Send + 'static,
    P: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<H: PayloadHook<R, P> + 'static>(&mut self, hook: H) -> &mut Self {
        Arc::make_mut(&mut self.hooks).push(Arc::new(hook));
        self
    }

    /// Append a hook returning its replacement (or `None`) directly.
    pub fn add_sync<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut R, &P) -> Result<Option<P>, HookError> + Send + Sync + 'static,
    {
        self.add(SyncPayloadHook(hook))
    }

    /// Append a hook completing through `Done::ok`, `Done::replace` or `Done::fail`.
    pub fn add_callback<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut R, &P, Done<P>) + Send + Sync + 'static,
    {
        self.add(CallbackPayloadHook(hook))
    }

    /// Append a hook whose future resolves to the replacement (or `None`).
    pub fn add_async<F>(&mut self, hook: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut R, &'a P) -> BoxFuture<'a, Result<Option<P>, HookError>>
            + Send
            + Sync
            + 'static,
    {
        self.add(AsyncPayloadHook(hook))
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run the chain, returning the final payload.
    pub async fn run(&self, reply: &mut R, payload: P) -> Result<P, Interrupted<P>> {
        let hooks = Arc::clone(&self.hooks);
        let mut payload = payload;

        for (index, hook) in hooks.iter().enumerate() {
            let (done, rx) = Done::channel();
            let invoked = hook.invoke(&mut *reply, &payload, done);
            let outcome = settle(index, invoked, rx).await;

            match outcome {
                Ok(Some(next)) => payload = next,
                Ok(None) => {}
                Err(error) => {
                    tracing::debug!(hook = index, error = %error, "Payload chain interrupted");
                    return Err(Interrupted { error, payload });
                }
            }
        }

        Ok(payload)
    }

    /// Run the chain and report `(error, reply, payload)` exactly once.
    pub async fn run_with<F>(&self, reply: &mut R, payload: P, on_done: F)
    where
        F: FnOnce(Option<HookError>, &mut R, P),
    {
        match self.run(reply, payload).await {
            Ok(payload) => on_done(None, reply, payload),
            Err(Interrupted { error, payload }) => on_done(Some(error), reply, payload),
        }
    }
}
