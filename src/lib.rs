//! pgmon - PostgreSQL monitoring and review agent
//!
//! This library collects PostgreSQL configuration, server logs, SQL files and
//! host metrics, forwards them to a review API for analysis, and can run as a
//! small HTTP server exposing registered database metrics to Prometheus.

pub mod app;
pub mod cli;
pub mod collector;
pub mod collectors;
pub mod config;
pub mod db;
pub mod metrics;
pub mod models;
pub mod report;
pub mod review;
pub mod secrets;
pub mod server;
pub mod task_manager;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
