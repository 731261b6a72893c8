//! Resolver client seam
//!
//! `CandidateResolver` is what the cache calls. `JsonResolver` puts the
//! wire encoding in front of any byte transport.

use std::cell::RefCell;
use std::rc::Rc;

use super::errors::{ResolverError, ResolverResult};
use super::protocol::{ResolveRequest, ResolveResponse};

/// Answers one batched resolution request; blocks until done
pub trait CandidateResolver {
    fn resolve(&mut self, request: &ResolveRequest) -> ResolverResult<ResolveResponse>;
}

impl<R: CandidateResolver + ?Sized> CandidateResolver for Box<R> {
    fn resolve(&mut self, request: &ResolveRequest) -> ResolverResult<ResolveResponse> {
        (**self).resolve(request)
    }
}

/// Shared handle, so a caller can inspect the resolver while a query owns it
impl<R: CandidateResolver> CandidateResolver for Rc<RefCell<R>> {
    fn resolve(&mut self, request: &ResolveRequest) -> ResolverResult<ResolveResponse> {
        self.borrow_mut().resolve(request)
    }
}

/// Moves one encoded request to the resolver service and returns its body
pub trait Transport {
    fn post(&mut self, body: &str) -> ResolverResult<String>;
}

/// JSON-encoding resolver over a transport
pub struct JsonResolver<T: Transport> {
    transport: T,
}

impl<T: Transport> JsonResolver<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl<T: Transport> CandidateResolver for JsonResolver<T> {
    fn resolve(&mut self, request: &ResolveRequest) -> ResolverResult<ResolveResponse> {
        let body = serde_json::to_string(request)
            .map_err(|e| ResolverError::Transport(format!("cannot encode request: {}", e)))?;
        let reply = self.transport.post(&body)?;
        serde_json::from_str(&reply)
            .map_err(|e| ResolverError::Malformed(format!("{}: {}", e, truncate(&reply, 120))))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
