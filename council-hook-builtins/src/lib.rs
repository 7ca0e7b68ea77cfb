#![deny(missing_docs)]
//! The three concrete hooks of the council ecosystem (§4.6): session
//! bootstrap, a pre-tool-use guardrail, and a post-tool-use quality gate.
//!
//! Each hook is a standalone [`council_core::hook::Hook`] implementation;
//! wire them into a `council_hooks::HookManager` in whatever combination a
//! deployment needs.

mod post_tool_use;
mod pre_tool_use;
mod session_start;

pub use post_tool_use::PostToolUseHook;
pub use pre_tool_use::PreToolUseHook;
pub use session_start::SessionStartHook;
