//! Test utilities and helpers for the SB8200 exporter.
//!
//! Mock implementations, captured pages, configuration builders and a
//! legacy TLS server used throughout the codebase.

#![cfg(test)]

pub mod config;
pub mod fixtures;
pub mod mocks;
pub mod tls;
