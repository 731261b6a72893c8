//! Open attributes
//!
//! An open attribute is a column that does not live in local storage. Its
//! values come from the resolver, keyed by a tuple of local join columns.
//!
//! - `OpenAttribute` holds the definition, the chosen strategy, the
//!   measured selectivities, and the candidate cache
//! - `KeySpec` is the explicit hash/equality context for join keys
//! - `AttributeRegistry` owns all attributes of a query

mod attribute;
mod key;
mod registry;

pub use attribute::{AttributeFlags, AttributeId, OpenAttribute, Strategy};
pub use key::{KeyColumnOps, KeySpec, KeyTuple};
pub use registry::AttributeRegistry;
