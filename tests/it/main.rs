//! Integration tests driving the crate's public API end to end, against zip
//! fixtures built in memory rather than checked into the tree.
//!
//! Each test calls `pretty_env_logger::init()` first so `RUST_LOG=debug`
//! surfaces the crate's own logging during a failing run; repeated calls
//! across tests in the same binary are harmless, the logger only installs
//! once.

mod fixtures;
mod local;
mod scenarios;
