//! One-shot HTTP helper for ad-hoc calls against an endpoint's request
//! address.
//!
//! No connection lifecycle and no retries: each call is a single request
//! whose outcome is mirrored into the event log.

pub mod client;

pub use client::{HttpClient, HttpError, HttpResponse, join_path};
