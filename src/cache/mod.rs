//! Candidate cache
//!
//! - One cache per open attribute, owned by the attribute
//! - Keys are registered while the join spools its outer input
//! - `resolve_all` fills every pending key with one resolver call per scan
//! - Resolved bundles are shared by `Rc` and never mutated, so a plan swap
//!   can hand the whole cache to the replacement pipeline

mod bundle;
mod cache;
mod resolve;

pub use bundle::CandidateBundle;
pub use cache::CandidateCache;
pub use resolve::resolve_all;
