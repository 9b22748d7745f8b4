//! Pipeline run states and the transitions between them.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Invoking,
    FallbackInvoking,
    Extracting,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Invoking => "invoking",
            PipelineState::FallbackInvoking => "fallback_invoking",
            PipelineState::Extracting => "extracting",
            PipelineState::Succeeded => "succeeded",
            PipelineState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Succeeded | PipelineState::Failed)
    }

    /// Whether `next` may follow `self`.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Invoking)
                | (Invoking, Extracting)
                | (Invoking, FallbackInvoking)
                | (Invoking, Failed)
                | (FallbackInvoking, Extracting)
                | (FallbackInvoking, Failed)
                | (Extracting, Succeeded)
                | (Extracting, Failed)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Illegal pipeline transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub from: PipelineState,
    pub to: PipelineState,
}

/// Current state plus every state visited, starting at `Idle`.
#[derive(Debug, Clone)]
pub struct StateMachine {
    trace: Vec<PipelineState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            trace: vec![PipelineState::Idle],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.trace
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    pub fn advance(&mut self, next: PipelineState) -> Result<(), IllegalTransition> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(IllegalTransition { from, to: next });
        }
        self.trace.push(next);
        Ok(())
    }

    /// Move to `Failed` from wherever the run is, if that is legal.
    pub fn fail(&mut self) {
        if self.current().can_transition_to(PipelineState::Failed) {
            self.trace.push(PipelineState::Failed);
        }
    }

    pub fn trace(&self) -> &[PipelineState] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<PipelineState> {
        self.trace
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
