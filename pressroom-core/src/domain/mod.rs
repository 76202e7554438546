//! Domain models for Pressroom Core

pub mod article;

pub use article::*;
