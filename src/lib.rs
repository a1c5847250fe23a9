//! Cache-backed query orchestration for leaderboard analytics.

pub mod application;
pub mod cache;
pub mod compare;
pub mod config;
pub mod domain;
pub mod infra;
pub mod query;
