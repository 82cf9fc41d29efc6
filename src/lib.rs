//! SyncVote - REST backend for a discussion and voting platform
//!
//! Users register and log in, publish posts tagged with categories, comment
//! on posts, and vote posts and comments up or down.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
