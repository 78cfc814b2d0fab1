//! Saved provider queries: normalization, identity and the persisted store.

pub mod identity;
pub mod normalizer;
pub mod store;

pub use identity::QueryId;
pub use normalizer::{NormalizedQuery, Normalizer};
pub use store::{validate_description, QueryStore, SavedQuery};
