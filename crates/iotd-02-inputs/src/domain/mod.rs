//! # Domain Layer

pub mod registry;
