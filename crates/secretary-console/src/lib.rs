//! Operator console for the AI-secretary admin API.
//!
//! Reads commands line by line (or one from the process arguments), runs
//! them against a shared [`context::Console`] and prints the result followed
//! by any notifications the command raised.

pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod token;
