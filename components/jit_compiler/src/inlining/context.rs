//! Per-level inlining state.

use crate::ir::INLINEE_META_ARGS;

/// State handed down one inlining level.
///
/// The context is copied into each recursive call rather than mutated and
/// restored, so the caller's values are untouched when the callee returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InliningContext {
    /// First free frame slot for the next inlinee's arguments
    pub frame_slot: u32,
    /// Self-recursive inlining depth
    pub recursive_depth: u32,
    /// Inline nesting below the top function
    pub nesting: u32,
    /// Loops enclosing the current position, counted across inline levels
    pub in_loop: u32,
    /// For-in nesting at the current position
    pub for_in_depth: u32,
    /// Walking inside an inlined `.apply` target, at any depth
    pub apply_target: bool,
}

impl InliningContext {
    /// Context for walking the top-level function.
    pub fn top() -> Self {
        Self::default()
    }

    /// Context for walking an inlinee spliced at a call with `actual_count`
    /// arguments. `same_body` says the inlinee is the caller's own body.
    pub fn for_inlinee(self, actual_count: u32, same_body: bool) -> Self {
        Self {
            frame_slot: self.frame_slot + INLINEE_META_ARGS + actual_count,
            recursive_depth: if same_body { self.recursive_depth + 1 } else { 0 },
            nesting: self.nesting + 1,
            ..self
        }
    }
}
