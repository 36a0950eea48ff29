//! X-ray Fracture Detection Service
//!
//! This library provides the job-processing core of the bone-scan service:
//! uploaded images are queued as detection jobs, a single background worker
//! runs them against lazily-loaded models, and clients poll for the result.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
