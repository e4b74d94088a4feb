//! Step runner
//!
//! Signs fitness-tracker accounts in through a cached, three-tier session
//! policy and submits a synthetic daily step count for each of them.

pub mod app;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod mask;
pub mod models;
pub mod notify;
pub mod runlog;
pub mod runner;
pub mod session;
pub mod steps;
pub mod zepp;
