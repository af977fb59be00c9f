#![forbid(unsafe_code)]

pub mod app;
pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod deadline;
pub mod error;
pub mod logging;
pub mod message;
pub mod model;
pub mod scheduler;
pub mod service;
pub mod sheet;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;
