//! vq-core: Shared types and utilities for VariQ
//!
//! This crate provides the foundational types used across all VariQ crates:
//! the sample type, decibel conversions, and the common error type.

mod db;
mod error;
mod sample;

pub use db::*;
pub use error::*;
pub use sample::*;
