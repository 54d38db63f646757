//! Client-side orchestration for the vertical intelligence dashboard.
//!
//! Each panel loads three resources for its vertical. When that fails it
//! degrades to polling the backend health endpoint, diagnosing version skew
//! along the way, and asks the host for a full reload once the backend is
//! ready.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod diagnosis;
pub mod fetch;
pub mod health;
pub mod logging;
pub mod panel;
pub mod poller;
pub mod probe;
pub mod vertical;
