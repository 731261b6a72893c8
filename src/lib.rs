//! openattr - query execution over open attributes
//!
//! An open attribute is a column whose values are not stored locally but
//! resolved at runtime, in batches, from an external candidate resolver.
//! Every key may have several candidate values; execution enumerates the
//! combinations of candidate choices like an odometer and may switch
//! strategies or swap in a replanned pipeline once real selectivities are
//! known.

pub mod attribute;
pub mod cache;
pub mod cli;
pub mod config;
pub mod executor;
pub mod observability;
pub mod planner;
pub mod resolver;
