//! Content rewriters
//!
//! Given a requirement and a target version, produce the new manifest text
//! with exactly that declaration changed:
//! - Line rewriter for line-oriented grammars (requirements, tox, setup.cfg, conda)
//! - Pipfile rewriter (edits the entry's version string in place)
//! - Pipfile.lock rewriter (re-serialises the JSON document)
//!
//! A declaration that cannot be found leaves the content unchanged; callers
//! treat unchanged output as a failed edit.

mod line;
mod pipfile;
mod pipfile_lock;

pub use line::{render_declaration, LineRewriter};
pub use pipfile::PipfileRewriter;
pub use pipfile_lock::PipfileLockRewriter;

use crate::domain::{FileType, Requirement};

/// Trait for rewriting one declaration inside manifest content
pub trait ContentRewriter {
    /// Rewrite `requirement` to `==target`.
    ///
    /// `hashes` are the digests for the target version (`sha256:<digest>`);
    /// pass an empty slice to emit none.
    fn rewrite(&self, content: &str, requirement: &Requirement, target: &str, hashes: &[String])
        -> String;
}

/// Get the rewriter for the specified file type
pub fn get_rewriter(file_type: FileType) -> Box<dyn ContentRewriter> {
    match file_type {
        FileType::Pipfile => Box::new(PipfileRewriter),
        FileType::PipfileLock => Box::new(PipfileLockRewriter),
        other => Box::new(LineRewriter::new(other.anchored_match())),
    }
}

/// Rewrite with the rewriter matching the requirement's file type
pub fn rewrite(content: &str, requirement: &Requirement, target: &str, hashes: &[String]) -> String {
    get_rewriter(requirement.file_type).rewrite(content, requirement, target, hashes)
}
