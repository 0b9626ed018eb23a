//! Shelfwatch notification delivery worker.
//!
//! Claims jobs from the `notification_jobs` queue and delivers restock
//! emails. Modules:
//!
//! - `config`: environment configuration (SMTP, queue, concurrency)
//! - `db`: consuming side of the job queue
//! - `email`: SMTP transport and Askama email templates
//! - `runner`: claim loop, concurrency limiting and job dispatch

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod email;
pub mod runner;
