//! Manifest file types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported manifest grammars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Plain requirements list (requirements.txt, *.pip, *.in)
    RequirementsTxt,
    /// Plain-list grammar in a generated lockfile (requirements.lock)
    RequirementsLock,
    /// tox configuration (tox.ini)
    ToxIni,
    /// setuptools declarative config (setup.cfg)
    SetupCfg,
    /// conda environment file (environment.yml)
    CondaYml,
    /// pipenv manifest (Pipfile)
    Pipfile,
    /// pipenv lockfile (Pipfile.lock)
    PipfileLock,
}

impl FileType {
    /// Detect the grammar from a path.
    ///
    /// Anything not recognised is treated as a plain requirements list.
    pub fn from_path(path: &str) -> Self {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        if path.ends_with(".yml") || path.ends_with(".yaml") {
            FileType::CondaYml
        } else if path.ends_with(".ini") {
            FileType::ToxIni
        } else if file_name == "Pipfile" {
            FileType::Pipfile
        } else if file_name == "Pipfile.lock" {
            FileType::PipfileLock
        } else if file_name == "setup.cfg" {
            FileType::SetupCfg
        } else if path.ends_with(".lock") {
            FileType::RequirementsLock
        } else {
            FileType::RequirementsTxt
        }
    }

    /// Whether rewrites must match the declaration at the start of a line.
    ///
    /// Other grammars may indent their declarations, so they match the
    /// declaration anywhere on a line.
    pub fn anchored_match(&self) -> bool {
        matches!(self, FileType::RequirementsTxt)
    }

    /// Whether the grammar uses the plain one-declaration-per-line format
    pub fn is_plain_list(&self) -> bool {
        matches!(self, FileType::RequirementsTxt | FileType::RequirementsLock)
    }

    /// Returns the display name for this file type
    pub fn display_name(&self) -> &'static str {
        match self {
            FileType::RequirementsTxt => "requirements.txt",
            FileType::RequirementsLock => "requirements lockfile",
            FileType::ToxIni => "tox.ini",
            FileType::SetupCfg => "setup.cfg",
            FileType::CondaYml => "conda environment",
            FileType::Pipfile => "Pipfile",
            FileType::PipfileLock => "Pipfile.lock",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(FileType::from_path("requirements.txt"), FileType::RequirementsTxt);
        assert_eq!(FileType::from_path("reqs/base.pip"), FileType::RequirementsTxt);
        assert_eq!(FileType::from_path("environment.yml"), FileType::CondaYml);
        assert_eq!(FileType::from_path("conda/env.yaml"), FileType::CondaYml);
        assert_eq!(FileType::from_path("tox.ini"), FileType::ToxIni);
        assert_eq!(FileType::from_path("Pipfile"), FileType::Pipfile);
        assert_eq!(FileType::from_path("app/Pipfile.lock"), FileType::PipfileLock);
        assert_eq!(FileType::from_path("setup.cfg"), FileType::SetupCfg);
        assert_eq!(FileType::from_path("requirements.lock"), FileType::RequirementsLock);
    }

    #[test]
    fn test_unknown_paths_fall_back_to_plain_list() {
        assert_eq!(FileType::from_path("deps"), FileType::RequirementsTxt);
        assert_eq!(FileType::from_path("requirements.in"), FileType::RequirementsTxt);
    }

    #[test]
    fn test_anchored_match_only_for_requirements_txt() {
        assert!(FileType::RequirementsTxt.anchored_match());
        assert!(!FileType::RequirementsLock.anchored_match());
        assert!(!FileType::ToxIni.anchored_match());
        assert!(!FileType::CondaYml.anchored_match());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", FileType::Pipfile), "Pipfile");
        assert_eq!(format!("{}", FileType::ToxIni), "tox.ini");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&FileType::PipfileLock).unwrap();
        assert_eq!(json, "\"pipfile_lock\"");
    }
}
