//! Shelfwatch Poller library.
//!
//! Polls the upstream storefront's regional substores on a fixed interval,
//! looking for products that flipped from out-of-stock to in-stock. Each
//! flip becomes one notification job per user tracking the product.
//!
//! # Modules
//!
//! - [`session`] - Cookie-and-token session client for the storefront
//! - [`directory`] - Two-level pincode/substore directory on the KV cache
//! - [`snapshot`] - Last observed inventory, persisted between cycles
//! - [`poll`] - The diff algorithm and the polling engine
//! - [`fanout`] - Grouping restocks per user and enqueueing delivery jobs
//! - [`kv`] - Key-value cache trait with Postgres and in-memory backends
//! - [`db`] - Pool construction, tracking queries, job enqueue

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod directory;
pub mod fanout;
pub mod kv;
pub mod poll;
pub mod session;
pub mod snapshot;
