//! optout - an unsubscribe-capture service.
//!
//! Accepts opt-out requests over HTTP, persists them deduplicated to a
//! flat-file store, and periodically emails a CSV report of recent
//! unsubscribes before pruning records past a retention window.

pub mod config;
pub mod mail;
pub mod report;
pub mod server;
pub mod store;
pub mod types;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_utils;
