//! HTTP Handlers
//!
//! Endpoint handlers organized by concern.

pub mod admin;
pub mod ws;
