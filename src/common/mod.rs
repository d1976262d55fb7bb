/// Common utilities, constants, types and chain plumbing for the pair sniper.
pub mod abi;
pub mod alert;
pub mod constants;
pub mod errors;
pub mod execution;
pub mod pools;
pub mod setup;
pub mod streams;
pub mod utils;
