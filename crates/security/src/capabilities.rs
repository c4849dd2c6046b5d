//! Closed-world allow-lists for the three resource kinds a caller can name:
//! systemd services, filesystem paths, and predefined tasks.
//!
//! A registry is immutable once built. Settings updates build a fresh one and
//! swap it into the [`CapabilityStore`] whole, so a request always checks
//! against a single consistent table.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use warden_config::Settings;
use warden_core::constants::{DEFAULT_ALLOWED_PATHS, WILDCARD};
use warden_core::{is_wildcard_list, Error, Result, TaskDefinition};

const SERVICE_SUFFIX: &str = ".service";

#[derive(Debug, Clone)]
struct ServiceAllowList {
    any: bool,
    names: Vec<String>,
}

impl ServiceAllowList {
    fn new(entries: &[String]) -> Self {
        Self {
            any: is_wildcard_list(entries),
            names: entries
                .iter()
                .filter(|e| e.as_str() != WILDCARD)
                .map(|e| normalize_service(e).to_string())
                .collect(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        let name = normalize_service(name);
        if name.is_empty() {
            return false;
        }
        self.any || self.names.iter().any(|n| n == name)
    }
}

#[derive(Debug, Clone)]
struct PathAllowList {
    any: bool,
    prefixes: Vec<PathBuf>,
}

impl PathAllowList {
    fn new(entries: &[String]) -> Self {
        let defaults: Vec<String>;
        let entries = if entries.is_empty() {
            defaults = DEFAULT_ALLOWED_PATHS.iter().map(|p| (*p).to_string()).collect();
            &defaults
        } else {
            entries
        };

        Self {
            any: is_wildcard_list(entries),
            prefixes: entries
                .iter()
                .filter(|e| e.as_str() != WILDCARD)
                .map(|e| normalize_path(e))
                .collect(),
        }
    }

    fn contains(&self, path: &Path) -> bool {
        self.any || self.prefixes.iter().any(|prefix| path.starts_with(prefix))
    }
}

/// Immutable capability table
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    services: ServiceAllowList,
    paths: PathAllowList,
    tasks: BTreeMap<String, TaskDefinition>,
}

impl CapabilityRegistry {
    pub fn new(services: &[String], paths: &[String], tasks: Vec<TaskDefinition>) -> Self {
        Self {
            services: ServiceAllowList::new(services),
            paths: PathAllowList::new(paths),
            tasks: tasks.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.allowed_services,
            &settings.allowed_paths,
            settings.tasks.clone(),
        )
    }

    /// Exact match after dropping a trailing `.service`
    #[must_use]
    pub fn is_service_allowed(&self, name: &str) -> bool {
        self.services.contains(name)
    }

    /// Ancestor-or-self match on the lexically cleaned absolute path
    #[must_use]
    pub fn is_path_allowed(&self, path: &str) -> bool {
        self.paths.contains(&normalize_path(path))
    }

    #[must_use]
    pub fn get_task(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.get(name)
    }

    #[must_use]
    pub fn requires_confirmation(&self, task: &TaskDefinition) -> bool {
        task.dangerous
    }

    pub fn check_service(&self, name: &str) -> Result<()> {
        if self.is_service_allowed(name) {
            Ok(())
        } else {
            Err(Error::forbidden(
                name,
                format!("service '{name}' is not in allowed list"),
            ))
        }
    }

    /// Check `path` and hand back its cleaned form for the collaborator to use
    pub fn check_path(&self, path: &str) -> Result<PathBuf> {
        if path.trim().is_empty() {
            return Err(Error::bad_request("path parameter is required"));
        }
        let cleaned = normalize_path(path);
        if self.paths.contains(&cleaned) {
            Ok(cleaned)
        } else {
            Err(Error::forbidden(
                path,
                format!("path '{}' is not in allowed paths", cleaned.display()),
            ))
        }
    }

    pub fn check_task(&self, name: &str, confirmed: bool) -> Result<&TaskDefinition> {
        let task = self
            .get_task(name)
            .ok_or_else(|| Error::not_found(name, format!("task '{name}' not found")))?;

        if self.requires_confirmation(task) && !confirmed {
            return Err(Error::bad_request(format!(
                "task '{name}' is dangerous, add ?confirm=true to execute"
            )));
        }
        Ok(task)
    }

    /// Task definitions in name order
    pub fn tasks(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.tasks.values()
    }

    /// Cleaned path prefixes, or `["*"]` when unrestricted
    #[must_use]
    pub fn allowed_paths(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .paths
            .prefixes
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        if self.paths.any {
            out.insert(0, WILDCARD.to_string());
        }
        out
    }

    #[must_use]
    pub fn allowed_services(&self) -> Vec<String> {
        let mut out = self.services.names.clone();
        if self.services.any {
            out.insert(0, WILDCARD.to_string());
        }
        out
    }
}

/// Shared handle to the current registry
#[derive(Debug)]
pub struct CapabilityStore {
    current: RwLock<Arc<CapabilityRegistry>>,
}

impl CapabilityStore {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// The registry in force right now; later replacements do not affect it
    #[must_use]
    pub fn snapshot(&self) -> Arc<CapabilityRegistry> {
        self.current.read().clone()
    }

    pub fn replace(&self, registry: CapabilityRegistry) {
        *self.current.write() = Arc::new(registry);
        tracing::info!("capability allow-lists replaced");
    }
}

fn normalize_service(name: &str) -> &str {
    let name = name.trim();
    name.strip_suffix(SERVICE_SUFFIX).unwrap_or(name)
}

/// Make `path` absolute against the working directory and clean it lexically.
///
/// `.` is dropped and `..` removes the previous component but never climbs
/// above the root. Symlinks are not resolved.
#[must_use]
pub fn normalize_path(path: &str) -> PathBuf {
    let raw = Path::new(path.trim());
    let absolute = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(raw)
    };

    let mut cleaned = PathBuf::from("/");
    for component in absolute.components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::ParentDir => {
                cleaned.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    cleaned
}
