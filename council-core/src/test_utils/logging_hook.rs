//! LoggingHook — records every event it fires on and always allows.

use crate::error::HookError;
use crate::hook::{Hook, HookAction, HookContext, HookResult, HookType};
use async_trait::async_trait;
use std::sync::Mutex;

/// A recorded hook event for inspection in tests.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    /// The hook point that fired.
    pub hook_type: HookType,
    /// The tool involved, if any.
    pub tool_name: Option<String>,
}

/// A hook that records every event and always returns [`HookAction::Allow`].
/// Call `.events()` to inspect what was recorded.
pub struct LoggingHook {
    points: Vec<HookType>,
    events: Mutex<Vec<RecordedEvent>>,
}

impl LoggingHook {
    /// Create a new `LoggingHook` that fires at every hook point.
    pub fn new() -> Self {
        Self {
            points: vec![
                HookType::SessionStart,
                HookType::PreToolUse,
                HookType::PostToolUse,
                HookType::PreInference,
                HookType::PostInference,
                HookType::ExitCheck,
            ],
            events: Mutex::new(Vec::new()),
        }
    }

    /// Return a snapshot of all recorded events.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Default for LoggingHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Hook for LoggingHook {
    fn points(&self) -> &[HookType] {
        &self.points
    }

    fn priority(&self) -> u32 {
        50
    }

    async fn on_event(&self, ctx: &HookContext) -> Result<HookResult, HookError> {
        self.events.lock().unwrap().push(RecordedEvent {
            hook_type: ctx.hook_type.clone(),
            tool_name: ctx.tool_name.clone(),
        });
        Ok(HookResult::allow("logged", 0))
    }
}
