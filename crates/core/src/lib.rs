//! Core types and utilities for crypto-market-overwatch
//!
//! This crate provides shared types used across all components:
//! - Asset and quote definitions
//! - Snapshot type shared by the store and its readers
//! - Service configuration
//! - Error types

pub mod types;
pub mod config;
pub mod errors;

pub use types::*;
pub use config::*;
pub use errors::*;
