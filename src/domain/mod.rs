//! Core domain models for reqbot
//!
//! This module contains the fundamental types used throughout the application:
//! - Version and specifier types implementing Python version semantics
//! - Requirement declarations with their inline directives
//! - Released version sets for packages
//! - Manifest file types
//! - Change-request classification
//! - Run summary structures

mod change_request;
mod directive;
mod file_type;
mod package;
mod requirement;
mod specifier;
mod summary;
mod version;

pub use change_request::{
    canonical_title, prefixed_title, ChangeRequest, RequestKind, RequestState, CONFIG_ERROR_TITLE,
};
pub use directive::{is_ignored_file, is_ignored_line, Directive, UpdateCap};
pub use file_type::FileType;
pub use package::PackageVersions;
pub use requirement::{Evaluation, Requirement};
pub use specifier::{Operator, Specifier, SpecifierSet};
pub use summary::{EditSummary, RunSummary, UnitOutcome, UnitSummary};
pub use version::{compare_versions, PreKind, Version};
