//! Core domain + application logic for the QR relay backend.
//!
//! This crate is intentionally framework-agnostic. The HTTP facade and the
//! messaging gateway live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod login;
pub mod network;
pub mod relay;
pub mod scrape;
pub mod store;

pub use errors::{Error, Result};
