//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ParseError: one declaration line that is not a valid requirement
//! - ManifestError: a whole manifest whose outer grammar is broken
//! - RegistryError: issues talking to the package index
//! - ProviderError: issues talking to the hosting provider
//! - ConfigError: issues with the repository configuration

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Manifest file related errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Package index related errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Hosting provider related errors
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Configuration related errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A single line could not be read as a dependency declaration.
///
/// Callers drop the line and keep going with the rest of the file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing but whitespace or a comment
    #[error("line is empty")]
    Empty,

    /// The line does not start with a valid distribution name
    #[error("invalid requirement name in '{line}'")]
    InvalidName { line: String },

    /// A version specifier could not be understood
    #[error("invalid version specifier '{spec}' in '{line}'")]
    InvalidSpecifier { line: String, spec: String },

    /// URL or path based requirements are not version-managed
    #[error("unsupported requirement form '{line}'")]
    Unsupported { line: String },
}

/// Errors related to whole manifest files
#[derive(Error, Debug)]
pub enum ManifestError {
    /// YAML parsing error (environment files)
    #[error("failed to parse YAML in {path}: {message}")]
    YamlParseError { path: String, message: String },

    /// TOML parsing error (Pipfile)
    #[error("failed to parse TOML in {path}: {message}")]
    TomlParseError { path: String, message: String },

    /// JSON parsing error (Pipfile.lock)
    #[error("failed to parse JSON in {path}: {message}")]
    JsonParseError { path: String, message: String },
}

/// Errors related to package index communication
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Package not found in registry
    #[error("package '{package}' not found in {registry} registry")]
    PackageNotFound { package: String, registry: String },

    /// Network request failed
    #[error("failed to fetch package '{package}' from {registry}: {message}")]
    NetworkError {
        package: String,
        registry: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("rate limit exceeded for {registry} registry")]
    RateLimitExceeded { registry: String },

    /// Invalid response from registry
    #[error("invalid response from {registry} for '{package}': {message}")]
    InvalidResponse {
        package: String,
        registry: String,
        message: String,
    },

    /// Timeout
    #[error("timeout while fetching '{package}' from {registry}")]
    Timeout { package: String, registry: String },
}

/// Errors raised by a hosting provider backend
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The branch to create is already present
    #[error("branch '{branch}' already exists")]
    BranchExists { branch: String },

    /// The acting identity may not perform the operation
    #[error("no permission: {message}")]
    NoPermission { message: String },

    /// The repository cannot be resolved
    #[error("repository '{repo}' does not exist")]
    RepoDoesNotExist { repo: String },

    /// A referenced object (file, branch, pull request) is missing
    #[error("not found: {what}")]
    NotFound { what: String },

    /// An optimistic-concurrency commit was rejected
    #[error("commit to '{path}' rejected: {message}")]
    Conflict { path: String, message: String },

    /// Transport or unexpected API failure
    #[error("provider request failed: {message}")]
    Http { message: String },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The repository configuration file is not valid YAML for our schema
    #[error("invalid configuration file: {message}")]
    InvalidFile { content: String, message: String },

    /// A scheduled run was requested with a cadence we cannot interpret
    #[error("unsupported schedule '{schedule}'")]
    UnsupportedSchedule { schedule: String },

    /// Invalid update policy value
    #[error("invalid update policy '{value}': expected 'all', 'insecure' or 'false'")]
    InvalidUpdatePolicy { value: String },
}

impl RegistryError {
    /// Creates a new PackageNotFound error
    pub fn package_not_found(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::PackageNotFound {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Creates a new NetworkError
    pub fn network_error(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::NetworkError {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new InvalidResponse error
    pub fn invalid_response(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::InvalidResponse {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new Timeout error
    pub fn timeout(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::Timeout {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Returns true if the error means the package simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::PackageNotFound { .. })
    }
}

impl ProviderError {
    /// Creates a new BranchExists error
    pub fn branch_exists(branch: impl Into<String>) -> Self {
        ProviderError::BranchExists {
            branch: branch.into(),
        }
    }

    /// Creates a new NoPermission error
    pub fn no_permission(message: impl Into<String>) -> Self {
        ProviderError::NoPermission {
            message: message.into(),
        }
    }

    /// Creates a new NotFound error
    pub fn not_found(what: impl Into<String>) -> Self {
        ProviderError::NotFound { what: what.into() }
    }

    /// Creates a new Http error
    pub fn http(message: impl Into<String>) -> Self {
        ProviderError::Http {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_messages() {
        let err = ParseError::InvalidName {
            line: "-e .".to_string(),
        };
        assert!(err.to_string().contains("invalid requirement name"));

        let err = ParseError::InvalidSpecifier {
            line: "foo>>1".to_string(),
            spec: ">>1".to_string(),
        };
        assert!(err.to_string().contains(">>1"));
    }

    #[test]
    fn test_manifest_error_yaml_parse() {
        let err = ManifestError::YamlParseError {
            path: "environment.yml".to_string(),
            message: "bad indent".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("failed to parse YAML"));
        assert!(msg.contains("environment.yml"));
    }

    #[test]
    fn test_registry_error_package_not_found() {
        let err = RegistryError::package_not_found("nonexistent-package", "PyPI");
        let msg = format!("{}", err);
        assert!(msg.contains("package 'nonexistent-package' not found"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_registry_error_network() {
        let err = RegistryError::network_error("django", "PyPI", "connection refused");
        let msg = format!("{}", err);
        assert!(msg.contains("failed to fetch"));
        assert!(msg.contains("connection refused"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_registry_error_timeout() {
        let err = RegistryError::timeout("flask", "PyPI");
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_provider_error_branch_exists() {
        let err = ProviderError::branch_exists("reqbot-update-django-1.4.1-to-1.4.2");
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_config_error_unsupported_schedule() {
        let err = ConfigError::UnsupportedSchedule {
            schedule: "every fortnight".to_string(),
        };
        assert!(err.to_string().contains("every fortnight"));
    }

    #[test]
    fn test_app_error_from_provider_error() {
        let err: AppError = ProviderError::RepoDoesNotExist {
            repo: "acme/widgets".to_string(),
        }
        .into();
        assert!(err.to_string().contains("acme/widgets"));
    }

    #[test]
    fn test_app_error_from_registry_error() {
        let err: AppError = RegistryError::package_not_found("pkg", "PyPI").into();
        assert!(err.to_string().contains("package 'pkg' not found"));
    }
}
