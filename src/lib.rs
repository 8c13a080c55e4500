#![warn(rust_2018_idioms)]

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fanout;
pub mod handler;
pub mod healthcheck;
pub mod merge;
pub mod status;
pub mod watcher;

pub use healthcheck::{healthcheck, healthcheck_with_port};
