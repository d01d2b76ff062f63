//! Permission grants supplied per invocation and checked by the governor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Permission classes a tool descriptor may require.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionClass {
    /// Read files below an allowed path.
    FileSystemRead,
    /// Create or overwrite files below an allowed path.
    FileSystemWrite,
    /// Delete files below an allowed path.
    FileSystemDelete,
    /// Open network connections to allowed domains.
    Network,
    /// Spawn allowed external commands.
    ProcessExecution,
    /// Read host and process information.
    SystemInfo,
    /// Read or modify environment variables.
    Environment,
}

impl PermissionClass {
    /// Stable label used in denial messages and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FileSystemRead => "filesystem-read",
            Self::FileSystemWrite => "filesystem-write",
            Self::FileSystemDelete => "filesystem-delete",
            Self::Network => "network",
            Self::ProcessExecution => "process-execution",
            Self::SystemInfo => "system-info",
            Self::Environment => "environment",
        }
    }
}

/// Level of environment variable access granted to a tool.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvAccess {
    /// No environment access.
    #[default]
    None,
    /// Environment variables may be read but not modified.
    ReadOnly,
    /// Environment variables may be read and modified.
    Full,
}

/// Grants supplied by the caller for one invocation or chain run.
///
/// Enforcement is cooperative: the governor checks the grant for every
/// permission class a descriptor requires, and path/domain/command scoped
/// tools re-check their concrete argument against the allow-lists through
/// [`Permissions::is_path_allowed`] and friends. An empty allow-list places
/// no restriction beyond the grant itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    file_read: bool,
    #[serde(default)]
    file_write: bool,
    #[serde(default)]
    file_delete: bool,
    #[serde(default)]
    network: bool,
    #[serde(default)]
    https_only: bool,
    #[serde(default)]
    process: bool,
    #[serde(default)]
    system_info: bool,
    #[serde(default)]
    env_access: EnvAccess,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    allowed_paths: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    allowed_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    allowed_commands: Vec<String>,
}

impl Permissions {
    /// Creates a grant set with nothing permitted.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a grant set with every class permitted and no allow-list
    /// restrictions. Intended for trusted callers and tests.
    #[must_use]
    pub fn full() -> Self {
        Self {
            file_read: true,
            file_write: true,
            file_delete: true,
            network: true,
            https_only: false,
            process: true,
            system_info: true,
            env_access: EnvAccess::Full,
            allowed_paths: Vec::new(),
            allowed_domains: Vec::new(),
            allowed_commands: Vec::new(),
        }
    }

    /// Grants file reads.
    #[must_use]
    pub fn allow_file_read(mut self) -> Self {
        self.file_read = true;
        self
    }

    /// Grants file creation and overwrites.
    #[must_use]
    pub fn allow_file_write(mut self) -> Self {
        self.file_write = true;
        self
    }

    /// Grants file deletion.
    #[must_use]
    pub fn allow_file_delete(mut self) -> Self {
        self.file_delete = true;
        self
    }

    /// Grants network access.
    #[must_use]
    pub fn allow_network(mut self) -> Self {
        self.network = true;
        self
    }

    /// Restricts network access to HTTPS endpoints.
    #[must_use]
    pub fn require_https(mut self) -> Self {
        self.https_only = true;
        self
    }

    /// Grants external process execution.
    #[must_use]
    pub fn allow_process_execution(mut self) -> Self {
        self.process = true;
        self
    }

    /// Grants host and process information reads.
    #[must_use]
    pub fn allow_system_info(mut self) -> Self {
        self.system_info = true;
        self
    }

    /// Sets the environment variable access level.
    #[must_use]
    pub fn with_env_access(mut self, env_access: EnvAccess) -> Self {
        self.env_access = env_access;
        self
    }

    /// Adds a path prefix to the filesystem allow-list.
    #[must_use]
    pub fn allow_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.allowed_paths.push(path.into());
        self
    }

    /// Adds a domain entry to the network allow-list. Entries are either an
    /// exact domain (`example.com`) or a wildcard covering subdomains
    /// (`*.example.com`).
    #[must_use]
    pub fn allow_domain(mut self, domain: impl Into<String>) -> Self {
        self.allowed_domains.push(domain.into());
        self
    }

    /// Adds a command name to the process allow-list.
    #[must_use]
    pub fn allow_command(mut self, command: impl Into<String>) -> Self {
        self.allowed_commands.push(command.into());
        self
    }

    /// Returns `true` when the supplied permission class is granted.
    #[must_use]
    pub fn grants(&self, class: PermissionClass) -> bool {
        match class {
            PermissionClass::FileSystemRead => self.file_read,
            PermissionClass::FileSystemWrite => self.file_write,
            PermissionClass::FileSystemDelete => self.file_delete,
            PermissionClass::Network => self.network,
            PermissionClass::ProcessExecution => self.process,
            PermissionClass::SystemInfo => self.system_info,
            PermissionClass::Environment => self.env_access != EnvAccess::None,
        }
    }

    /// Returns `true` when the path falls under an allowed prefix.
    ///
    /// An empty allow-list permits every path; the permission class grant is
    /// still required separately.
    #[must_use]
    pub fn is_path_allowed(&self, path: &Path) -> bool {
        if self.allowed_paths.is_empty() {
            return true;
        }
        self.allowed_paths
            .iter()
            .any(|prefix| path.starts_with(prefix))
    }

    /// Returns `true` when the domain matches an allow-list entry.
    ///
    /// Exact entries match the whole domain; `*.` entries match any
    /// subdomain of the suffix. Matching is ASCII case-insensitive. An empty
    /// allow-list permits every domain.
    #[must_use]
    pub fn is_domain_allowed(&self, domain: &str) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }
        let domain = domain.to_ascii_lowercase();
        self.allowed_domains.iter().any(|entry| {
            let entry = entry.to_ascii_lowercase();
            match entry.strip_prefix("*.") {
                Some(suffix) => domain
                    .strip_suffix(suffix)
                    .is_some_and(|head| head.ends_with('.')),
                None => domain == entry,
            }
        })
    }

    /// Returns `true` when the command name matches an allow-list entry. An
    /// empty allow-list permits every command.
    #[must_use]
    pub fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }
        self.allowed_commands.iter().any(|entry| entry == command)
    }

    /// Returns `true` when network access is restricted to HTTPS.
    #[must_use]
    pub const fn https_only(&self) -> bool {
        self.https_only
    }

    /// Returns the environment variable access level.
    #[must_use]
    pub const fn env_access(&self) -> EnvAccess {
        self.env_access
    }

    /// Returns the filesystem allow-list.
    #[must_use]
    pub fn allowed_paths(&self) -> &[PathBuf] {
        &self.allowed_paths
    }

    /// Returns the domain allow-list.
    #[must_use]
    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed_domains
    }

    /// Returns the command allow-list.
    #[must_use]
    pub fn allowed_commands(&self) -> &[String] {
        &self.allowed_commands
    }
}
