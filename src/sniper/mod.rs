pub mod builder;
pub mod quote;
pub mod retry;
pub mod watcher;
