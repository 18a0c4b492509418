//! Built-in node implementations.
//!
//! Only node families whose behaviour is pure (or purely time-based) live
//! here. Families that talk to the outside world (`http`, `email`,
//! `database`) have validation rules but no built-in handler; embedders
//! register their own via [`NodeRegistry::register`](crate::NodeRegistry::register).

pub mod condition;
pub mod delay;
pub mod logic;
pub mod transform;
pub mod trigger;

pub use delay::DelayNode;
pub use logic::{FilterNode, IfNode, LoopNode, SwitchNode};
pub use transform::TransformNode;
pub use trigger::TriggerNode;
