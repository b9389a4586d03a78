//! Command line front end over the worker library

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
