//! `geist` command-line front end: Docker bridge, configuration, console
//! output and Markdown transcripts around the `coordination` orchestrator.

pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod docker_bridge;
pub mod dry_run;
pub mod render;
