//! ProteinsPlus job core
//!
//! Persisted tool jobs with content-fingerprint caching: equivalent requests
//! are answered with an existing job instead of being recomputed. Also
//! provides the job lifecycle around tool tasks, the Redis task queue, and
//! expiry of stale jobs and orphaned molecules.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
