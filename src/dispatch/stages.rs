//! Lifecycle extension points.

use axum::body::Bytes;

use crate::dispatch::state::RequestState;
use crate::hooks::{HookChain, PayloadHookChain};

/// Named points in the request lifecycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    OnRequest,
    PreParsing,
    PreValidation,
    PreHandler,
    Handler,
    OnSend,
    OnResponse,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::OnRequest => "onRequest",
            Stage::PreParsing => "preParsing",
            Stage::PreValidation => "preValidation",
            Stage::PreHandler => "preHandler",
            Stage::Handler => "handler",
            Stage::OnSend => "onSend",
            Stage::OnResponse => "onResponse",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook chains attached to a dispatcher.
///
/// `on_send` may replace the serialized payload. Failures in `on_response`
/// are logged only, the reply has already been produced.
#[derive(Debug, Clone, Default)]
pub struct LifecycleHooks {
    pub on_request: HookChain<RequestState>,
    pub pre_parsing: HookChain<RequestState>,
    pub pre_validation: HookChain<RequestState>,
    pub pre_handler: HookChain<RequestState>,
    pub on_send: PayloadHookChain<RequestState, Bytes>,
    pub on_response: HookChain<RequestState>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// State-only chain for `stage`; `None` for `Handler` and `OnSend`.
    pub fn chain(&self, stage: Stage) -> Option<&HookChain<RequestState>> {
        match stage {
            Stage::OnRequest => Some(&self.on_request),
            Stage::PreParsing => Some(&self.pre_parsing),
            Stage::PreValidation => Some(&self.pre_validation),
            Stage::PreHandler => Some(&self.pre_handler),
            Stage::OnResponse => Some(&self.on_response),
            Stage::Handler | Stage::OnSend => None,
        }
    }

    pub fn chain_mut(&mut self, stage: Stage) -> Option<&mut HookChain<RequestState>> {
        match stage {
            Stage::OnRequest => Some(&mut self.on_request),
            Stage::PreParsing => Some(&mut self.pre_parsing),
            Stage::PreValidation => Some(&mut self.pre_validation),
            Stage::PreHandler => Some(&mut self.pre_handler),
            Stage::OnResponse => Some(&mut self.on_response),
            Stage::Handler | Stage::OnSend => None,
        }
    }
}
