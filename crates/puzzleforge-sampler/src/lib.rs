//! Combinatorial sampling for PuzzleForge.
//!
//! The sampler selects random index tuples from data sources under layered
//! constraints:
//! - per-source pools built from `order`/`duplicate` (permutations,
//!   combinations, products)
//! - `dim_cond` groups that must differ across dimension repeats
//! - custom predicates at dimension scope (pruning the candidate pool) and
//!   at domain scope (rejection sampling over whole batches)
//!
//! Predicates are evaluated through the [`SamplingOracle`] and
//! [`OptionClassifier`] traits so the sampler stays independent of the
//! expression language.

pub mod partition;
pub mod pool;
pub mod request;
pub mod sampler;

pub use partition::{random_list, random_partition, Element, ElementDomain};
pub use pool::{field_pool, pool_size};
pub use request::{
    marker, parse_marker, Batch, CondScope, CustomCondition, OptionClassifier, Row, SamplingOracle,
    SamplingRequest, Selection,
};
pub use sampler::{IndexSampler, OptionSelection, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_POOL_SIZE};
