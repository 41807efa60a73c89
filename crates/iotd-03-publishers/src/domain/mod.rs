//! # Domain Layer

pub mod directory;
pub mod trust;
