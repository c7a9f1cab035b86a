//! Batch CLI for the climate dataset pipeline.

pub mod cli;
pub mod commands;
pub mod config;
