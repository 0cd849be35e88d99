//! Inlining decisions
//!
//! Pure predicates over profile records: nothing here touches the IR, so a
//! decision can be made speculatively and thrown away.

use super::InliningConfig;
use core_types::{FunctionJitTimeInfo, ProfileId};
use std::collections::HashMap;
use strum::IntoStaticStr;
use thiserror::Error;

/// A call site being considered for inlining.
#[derive(Debug, Clone, Copy)]
pub struct InliningCandidate<'a> {
    /// Callee observed at the call site
    pub callee: &'a FunctionJitTimeInfo,
    /// Function containing the call
    pub caller: &'a FunctionJitTimeInfo,
    /// Function being compiled
    pub top: &'a FunctionJitTimeInfo,
    /// Profiled call-site id
    pub call_site: ProfileId,
    /// `new` call
    pub is_ctor: bool,
    /// The call target is a fixed method
    pub is_fixed_method_call: bool,
    /// The call sits inside a loop of the caller
    pub in_loop: bool,
    /// The call sits outside every loop of a function that has loops
    pub outside_loops: bool,
    /// Self-recursive inlining depth at the call site
    pub recursive_depth: u32,
    /// Bit `i` set when argument `i + 1` (after `this`) is an int constant
    pub constant_args: u16,
    /// Call sites already inlined into the caller
    pub inlined_so_far: u32,
}

/// Reason why a call site was not inlined.
#[derive(Debug, Clone, PartialEq, Eq, Error, IntoStaticStr)]
pub enum InliningRejection {
    /// Callee has no body and is not a recognized built-in
    #[error("callee has no body")]
    NoBody,
    /// Callee makes too many calls itself
    #[error("callee has {count} call sites (max {max})")]
    TooManyCallSites {
        /// Profiled call sites of the callee
        count: u16,
        /// Limit
        max: u16,
    },
    /// Caller's inlining budget is spent
    #[error("budget exhausted after {inlined} inlinees")]
    BudgetExhausted {
        /// Call sites already inlined
        inlined: u32,
    },
    /// Self-recursion is too deep
    #[error("recursive depth {depth} exceeds {max}")]
    MaxDepthExceeded {
        /// Current recursive depth
        depth: u32,
        /// Limit
        max: u32,
    },
    /// No type feedback to speculate on
    #[error("callee has no profile info")]
    NoProfileInfo,
    /// Call outside any loop of a looping function and callee not tiny
    #[error("callee of size {size} too large outside loops (max {max})")]
    ColdOutsideLoop {
        /// Callee byte-code size
        size: u32,
        /// Limit
        max: u32,
    },
    /// Callee too large
    #[error("callee of size {size} too large (max {max})")]
    TooLarge {
        /// Callee byte-code size
        size: u32,
        /// Limit
        max: u32,
    },
}

/// Inlining statistics of one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InliningStats {
    /// Call sites considered
    pub candidates_considered: u64,
    /// Script functions inlined
    pub functions_inlined: u64,
    /// Built-ins inlined
    pub built_ins_inlined: u64,
    /// Polymorphic call sites inlined
    pub polymorphic_sites_inlined: u64,
    /// Getters and setters inlined
    pub accessors_inlined: u64,
    /// Calls rewritten to fixed-method calls without inlining
    pub fixed_method_calls: u64,
    /// Call sites rejected by the heuristic
    pub functions_rejected: u64,
    /// Rejections per reason
    pub rejection_counts: HashMap<&'static str, u64>,
}

impl InliningStats {
    /// Count a rejection.
    pub fn record_rejection(&mut self, rejection: &InliningRejection) {
        self.functions_rejected += 1;
        let key: &'static str = rejection.into();
        *self.rejection_counts.entry(key).or_insert(0) += 1;
    }

    /// Rejections for one reason, by variant name.
    pub fn rejections(&self, reason: &str) -> u64 {
        self.rejection_counts.get(reason).copied().unwrap_or(0)
    }
}

/// Decides whether call sites are worth inlining.
#[derive(Debug, Clone, Default)]
pub struct InliningHeuristics {
    config: InliningConfig,
}

impl InliningHeuristics {
    /// Create a decider with the given limits.
    pub fn new(config: InliningConfig) -> Self {
        Self { config }
    }

    /// The limits in use.
    pub fn config(&self) -> &InliningConfig {
        &self.config
    }

    /// Whether the candidate may be inlined into its caller.
    pub fn backend_inline_into_inliner(&self, candidate: &InliningCandidate<'_>) -> bool {
        self.decide(candidate).is_ok()
    }

    /// Check every rule in order and report the first one that fails.
    pub fn decide(&self, candidate: &InliningCandidate<'_>) -> Result<(), InliningRejection> {
        let callee = candidate.callee;
        let body = match (&callee.body, callee.built_in) {
            (Some(body), _) => Some(body),
            (None, Some(_)) => None,
            (None, None) => return Err(InliningRejection::NoBody),
        };

        if let Some(body) = body {
            if body.profiled_call_site_count > self.config.max_inlinee_call_sites {
                return Err(InliningRejection::TooManyCallSites {
                    count: body.profiled_call_site_count,
                    max: self.config.max_inlinee_call_sites,
                });
            }
        }

        if candidate.inlined_so_far >= self.config.max_inlinees_per_function {
            return Err(InliningRejection::BudgetExhausted {
                inlined: candidate.inlined_so_far,
            });
        }

        let depth = candidate.recursive_depth;
        let max = self.config.max_recursive_depth;
        let too_deep = if candidate.constant_args != 0 { depth > max } else { depth >= max };
        if too_deep {
            return Err(InliningRejection::MaxDepthExceeded { depth, max });
        }

        let Some(body) = body else {
            return Ok(());
        };

        if !body.has_profile_info {
            return Err(InliningRejection::NoProfileInfo);
        }

        let size = body.byte_code_count;
        if candidate.outside_loops && size > self.config.outside_loop_threshold {
            return Err(InliningRejection::ColdOutsideLoop {
                size,
                max: self.config.outside_loop_threshold,
            });
        }

        let max = if candidate.is_ctor {
            self.config.constructor_inline_threshold
        } else {
            self.config.max_inlinee_byte_code
        };
        if size > max {
            return Err(InliningRejection::TooLarge { size, max });
        }

        Ok(())
    }
}
