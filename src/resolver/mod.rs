//! Resolver client for open attributes
//!
//! - One blocking batched call per attribute per scan
//! - No retries; transport and decoding failures surface as `ResolverError`
//! - `FixtureResolver` answers from canned tables (CLI scenarios, tests)

mod client;
mod errors;
mod fixture;
mod protocol;

pub use client::{CandidateResolver, JsonResolver, Transport};
pub use errors::{ResolverError, ResolverResult};
pub use fixture::{FixtureEntry, FixtureResolver, FixtureTable};
pub use protocol::{ResolveRequest, ResolveResponse, ResponseCandidate};
