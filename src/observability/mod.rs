//! Observability for open-attribute execution
//!
//! - Structured logging (JSON lines)
//! - Per-query counters
//! - Begin/complete scopes around resolver calls
//!
//! Observability is read-only: nothing here changes what a query returns.
//!
//! ```ignore
//! use openattr::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::StrategySwitch, &[("keyword", "gdp")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_resolver_calls();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::EnumerationComplete);
        log_event(Event::PlanSwapComplete);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::CacheTransplant, &[("attribute", "0")]);
    }
}
