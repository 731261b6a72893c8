//! Observable events of open-attribute execution
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Resolution
    /// Batched resolver call issued
    ResolveBegin,
    /// Bundles filled from the response
    ResolveComplete,
    /// Resolver call or response validation failed (FATAL)
    ResolveFailed,
    /// A key came back without candidates and got a null candidate
    NullCandidateSynthesized,

    // Strategy
    /// Attribute switched to the direct strategy
    StrategySwitch,
    /// Reoptimizer kept the current strategy
    StrategyKept,
    /// Rewind-only materialization became transparent
    MaterializeElided,

    // Enumeration
    /// Odometer moved to the next digit vector
    CombinationAdvance,
    /// All combinations visited or budget exhausted
    EnumerationComplete,

    // Replanning
    /// Full replan requested from the host optimizer
    ReplanRequested,
    /// Plan swap started
    PlanSwapBegin,
    /// Replacement pipeline active
    PlanSwapComplete,
    /// Replacement rejected before the swap (FATAL)
    PlanSwapRejected,
    /// Candidate cache reused by the replacement pipeline
    CacheTransplant,
    /// Candidate cache dropped, attribute resolves again
    CacheReset,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ResolveBegin => "RESOLVE_BEGIN",
            Event::ResolveComplete => "RESOLVE_COMPLETE",
            Event::ResolveFailed => "RESOLVE_FAILED",
            Event::NullCandidateSynthesized => "NULL_CANDIDATE_SYNTHESIZED",

            Event::StrategySwitch => "STRATEGY_SWITCH",
            Event::StrategyKept => "STRATEGY_KEPT",
            Event::MaterializeElided => "MATERIALIZE_ELIDED",

            Event::CombinationAdvance => "COMBINATION_ADVANCE",
            Event::EnumerationComplete => "ENUMERATION_COMPLETE",

            Event::ReplanRequested => "REPLAN_REQUESTED",
            Event::PlanSwapBegin => "PLAN_SWAP_BEGIN",
            Event::PlanSwapComplete => "PLAN_SWAP_COMPLETE",
            Event::PlanSwapRejected => "PLAN_SWAP_REJECTED",
            Event::CacheTransplant => "CACHE_TRANSPLANT",
            Event::CacheReset => "CACHE_RESET",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::ResolveFailed | Event::PlanSwapRejected)
    }

    /// Severity this event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ResolveFailed | Event::PlanSwapRejected => Severity::Fatal,
            Event::NullCandidateSynthesized => Severity::Warn,
            Event::CombinationAdvance => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ResolveBegin,
            Event::ResolveComplete,
            Event::ResolveFailed,
            Event::NullCandidateSynthesized,
            Event::StrategySwitch,
            Event::StrategyKept,
            Event::MaterializeElided,
            Event::CombinationAdvance,
            Event::EnumerationComplete,
            Event::ReplanRequested,
            Event::PlanSwapBegin,
            Event::PlanSwapComplete,
            Event::PlanSwapRejected,
            Event::CacheTransplant,
            Event::CacheReset,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::ResolveFailed.is_fatal());
        assert!(Event::PlanSwapRejected.is_fatal());
        assert!(!Event::StrategySwitch.is_fatal());
        assert_eq!(Event::ResolveFailed.severity(), Severity::Fatal);
    }

    #[test]
    fn test_advance_is_trace_level() {
        assert_eq!(Event::CombinationAdvance.severity(), Severity::Trace);
    }
}
