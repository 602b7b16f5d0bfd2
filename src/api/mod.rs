//! HTTP API Module
//!
//! Axum request handlers and the response envelope. Every request terminates in
//! exactly one response; each failure class has a fixed status code and a fixed
//! `status_txt` marker, and any payload can be wrapped `callback(json)` for
//! JSONP-style consumers.

pub mod handlers;
pub mod response;
pub mod types;

#[cfg(test)]
mod tests;
