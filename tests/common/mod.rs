#![allow(dead_code)]

/// Shared fixtures for the integration tests
///
/// - `fixtures`: simulated drives and opened adapters
/// - `assertions`: invariants every finished run must satisfy

pub mod assertions;
pub mod fixtures;
