pub mod build_info;
pub mod commands;
pub mod engine;
pub mod error;
pub mod location;
pub mod migrate;
pub mod output;
pub mod report;
pub mod store;

pub use migrate::{Upgrader, upgrade};
