//! Token, identifier and comparison primitives shared by the security layers

pub mod compare;
pub mod random;

pub use compare::constant_time_eq;
pub use random::{correlation_id, random_token_hex};
