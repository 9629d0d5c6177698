//! Core business logic for sawab.

pub mod services;

pub use services::*;
