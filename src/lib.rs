//! Correlates GoCD stage-status notifications into pipeline-level lifecycle
//! events for ALM Octane.

pub mod auth;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod gocd;
pub mod octane;
pub mod output;
