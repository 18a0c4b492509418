//! `nodes` crate: the `NodeHandler` trait, node validation rules, built-in
//! node implementations and the dispatch registry.
//!
//! Every node family, built-in or embedder-supplied, must implement
//! [`NodeHandler`]. The engine crate dispatches execution through this trait
//! object after looking the handler up in a [`NodeRegistry`].

pub mod error;
pub mod kind;
pub mod traits;
pub mod rules;
pub mod builtin;
pub mod registry;
pub mod mock;

pub use error::NodeError;
pub use kind::{NodeCategory, NodeKind};
pub use registry::NodeRegistry;
pub use traits::{ExecutionContext, NodeHandler};
