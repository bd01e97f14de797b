//! Command line tool for event ntuple files

pub mod commands;
pub mod config;
