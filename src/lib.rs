//! Shomato seeds leaderboard.
//!
//! Ranks community members by the seeds collected on their best game post.
//! Posts come from the Shiba feed, are merged into a persisted cache that
//! never lets a post's seed total go down, and are refreshed in the
//! background every ten minutes.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod leaderboard;
pub mod routes;
pub mod scheduler;
pub mod server;
pub mod storage;
pub mod utils;
pub mod view;

#[cfg(test)]
mod testing;
