/// Main library module for the pair sniper.
///
/// `common` holds shared types, configuration and chain plumbing.
/// `sniper` holds quoting, transaction building, the retry controller and the pair watcher.
pub mod common;
pub mod sniper;
