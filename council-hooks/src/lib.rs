#![deny(missing_docs)]
//! Priority-ordered hook pipeline for the council runtime (§4.6).
//!
//! [`HookManager`] extends a registration-order `HookRegistry`-style
//! dispatch with the three properties §4.6 requires: hooks run in
//! ascending `priority` order
//! within a [`HookType`], a recursion-depth guard prevents runaway
//! self-triggering pipelines, and a `modify` result is merged into the
//! context before the next hook sees it.

use std::collections::HashMap;
use std::sync::Arc;

use council_core::hook::{Hook, HookAction, HookContext, HookResult, HookType};

/// Default recursion-depth ceiling (§4.6 step 1).
pub const DEFAULT_MAX_RECURSION_DEPTH: u32 = 3;

/// Dispatches hook events to an ordered, per-[`HookType`] pipeline.
///
/// Hooks registered for a given point are sorted by ascending
/// [`Hook::priority`] at registration time, so callers can register hooks
/// in any order.
pub struct HookManager {
    hooks: HashMap<HookType, Vec<Arc<dyn Hook>>>,
    max_recursion_depth: u32,
}

impl HookManager {
    /// Create an empty manager with the default recursion-depth ceiling.
    pub fn new() -> Self {
        Self {
            hooks: HashMap::new(),
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }

    /// Override the recursion-depth ceiling.
    pub fn with_max_recursion_depth(mut self, max: u32) -> Self {
        self.max_recursion_depth = max;
        self
    }

    /// Register a hook for every point it declares, keeping each point's
    /// pipeline sorted by ascending priority.
    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        for point in hook.points() {
            let bucket = self.hooks.entry(point.clone()).or_default();
            bucket.push(Arc::clone(&hook));
            bucket.sort_by_key(|h| h.priority());
        }
    }

    /// Run the pipeline for `hook_type` (§4.6 algorithm).
    ///
    /// `depth` is the caller's current recursion depth — callers that
    /// trigger hooks from within a hook handler must increment it on
    /// each nested call. `now_ms` stamps the returned result.
    pub async fn trigger(
        &self,
        hook_type: &HookType,
        ctx: &mut HookContext,
        depth: u32,
        stop_on_block: bool,
        now_ms: u64,
    ) -> HookResult {
        if depth >= self.max_recursion_depth {
            let mut result = HookResult::allow("max recursion depth reached", now_ms);
            result.metadata = serde_json::json!({"skipped": true});
            return result;
        }

        let Some(hooks) = self.hooks.get(hook_type) else {
            return HookResult::allow("no hooks registered for this point", now_ms);
        };

        let mut last_result: Option<HookResult> = None;
        let mut retry_result: Option<HookResult> = None;

        for hook in hooks {
            let result = match hook.on_event(ctx).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(hook_type = ?hook_type, error = %e, "hook handler failed; continuing");
                    HookResult {
                        action: HookAction::Allow,
                        message: "hook handler error".into(),
                        metadata: serde_json::Value::Null,
                        modified_data: None,
                        error: Some(e.to_string()),
                        timestamp: now_ms,
                    }
                }
            };

            match result.action {
                HookAction::Block if stop_on_block => return result,
                HookAction::Modify => {
                    if let Some(data) = &result.modified_data {
                        ctx.merge_modified(data);
                    }
                }
                HookAction::Retry => retry_result = Some(result.clone()),
                _ => {}
            }

            last_result = Some(result);
        }

        retry_result
            .or(last_result)
            .unwrap_or_else(|| HookResult::allow("no hooks fired", now_ms))
    }
}

impl Default for HookManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use council_core::error::HookError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingHook {
        points: Vec<HookType>,
        priority: u32,
        action: HookAction,
        calls: AtomicU32,
    }

    impl CountingHook {
        fn new(priority: u32, action: HookAction) -> Self {
            Self {
                points: vec![HookType::PreToolUse],
                priority,
                action,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Hook for CountingHook {
        fn points(&self) -> &[HookType] {
            &self.points
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        async fn on_event(&self, _ctx: &HookContext) -> Result<HookResult, HookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HookResult {
                action: self.action,
                message: "test".into(),
                metadata: serde_json::Value::Null,
                modified_data: None,
                error: None,
                timestamp: 0,
            })
        }
    }

    fn ctx() -> HookContext {
        HookContext::new(HookType::PreToolUse, "s1", "architect", "/work")
    }

    #[tokio::test]
    async fn block_stops_the_chain() {
        let mut manager = HookManager::new();
        let first = Arc::new(CountingHook::new(10, HookAction::Block));
        let second = Arc::new(CountingHook::new(20, HookAction::Allow));
        manager.register(first.clone());
        manager.register(second.clone());

        let result = manager.trigger(&HookType::PreToolUse, &mut ctx(), 0, true, 1).await;
        assert_eq!(result.action, HookAction::Block);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn recursion_depth_ceiling_short_circuits() {
        let manager = HookManager::new();
        let result = manager.trigger(&HookType::PreToolUse, &mut ctx(), 3, true, 1).await;
        assert_eq!(result.action, HookAction::Allow);
        assert_eq!(result.metadata, serde_json::json!({"skipped": true}));
    }

    #[tokio::test]
    async fn retry_wins_over_later_allow() {
        let mut manager = HookManager::new();
        manager.register(Arc::new(CountingHook::new(10, HookAction::Retry)));
        manager.register(Arc::new(CountingHook::new(20, HookAction::Allow)));

        let result = manager.trigger(&HookType::PreToolUse, &mut ctx(), 0, true, 1).await;
        assert_eq!(result.action, HookAction::Retry);
    }
}
