//! reqbot - Python requirement update bot library
//!
//! Reads the requirement files of a hosted repository, checks every pinned
//! or unpinned requirement against the package index and proposes updates
//! as pull requests:
//! - requirements.txt and friends, setup.cfg, tox.ini
//! - Pipfile and Pipfile.lock
//! - conda environment files (pip entries)

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod output;
pub mod parser;
pub mod progress;
pub mod provider;
pub mod reconcile;
pub mod registry;
pub mod rewriter;
pub mod update;
