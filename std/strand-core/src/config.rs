///
/// # Primitive Tuning Config
///
/// Process-wide knobs for the strand primitives, read from a `strand.toml`
/// file or built in code. Every key is optional and falls back to its default.
///
/// ## Example strand.toml
///
/// ```toml
/// default_stack_size = 262144   # bytes, used by Thread::start(0)
/// spin_sleep_ms = 1             # FastMutex back-off between attempts
/// spin_limit = 128              # SpinRWLock spins before yielding the core
/// max_name_len = 15             # thread names are truncated to this many bytes
/// ```
///
/// ## Installation
///
/// `install` publishes a config once for the whole process; the first call
/// wins. `get` returns the installed config, or the defaults if nothing was
/// installed yet. Primitives read the config at the moment they need a value,
/// so install it before creating threads.
///

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{Result, SyncError};

/// Hard bound on stored thread names, excluding the terminator.
pub const THREAD_NAME_CAPACITY: usize = 31;

pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;
pub const DEFAULT_SPIN_LIMIT: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    pub default_stack_size: usize,
    pub spin_sleep_ms: u32,
    pub spin_limit: u32,
    pub max_name_len: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_stack_size: DEFAULT_STACK_SIZE,
            spin_sleep_ms: 0,
            spin_limit: DEFAULT_SPIN_LIMIT,
            max_name_len: THREAD_NAME_CAPACITY,
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        Ok(config.normalized())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SyncConfig = toml::from_str(&content).map_err(|e| SyncError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(config.normalized())
    }

    /// Clamps values into the ranges the primitives can honor.
    pub fn normalized(mut self) -> Self {
        self.max_name_len = self.max_name_len.clamp(1, THREAD_NAME_CAPACITY);
        self.spin_limit = self.spin_limit.max(1);
        self
    }
}

static CONFIG: OnceLock<SyncConfig> = OnceLock::new();

/// Installs the process-wide config. Returns `false` if one was already set.
pub fn install(config: SyncConfig) -> bool {
    CONFIG.set(config.normalized()).is_ok()
}

pub fn get() -> &'static SyncConfig {
    CONFIG.get_or_init(SyncConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SyncConfig::from_toml_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.default_stack_size, DEFAULT_STACK_SIZE);
        assert_eq!(config.max_name_len, THREAD_NAME_CAPACITY);
    }

    #[test]
    fn test_partial_config() {
        let config = SyncConfig::from_toml_str("spin_sleep_ms = 2\nspin_limit = 8\n").unwrap();
        assert_eq!(config.spin_sleep_ms, 2);
        assert_eq!(config.spin_limit, 8);
        assert_eq!(config.default_stack_size, DEFAULT_STACK_SIZE);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let config = SyncConfig::from_toml_str("spin_limit = 0\nmax_name_len = 200\n").unwrap();
        assert_eq!(config.spin_limit, 1);
        assert_eq!(config.max_name_len, THREAD_NAME_CAPACITY);

        let config = SyncConfig::from_toml_str("max_name_len = 0\n").unwrap();
        assert_eq!(config.max_name_len, 1);
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let err = SyncConfig::from_toml_str("spin_limit = \"fast\"").unwrap_err();
        assert!(matches!(err, SyncError::Toml(_)));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("strand.toml");
        fs::write(&path, "default_stack_size = 65536\nmax_name_len = 15\n").unwrap();

        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.default_stack_size, 65536);
        assert_eq!(config.max_name_len, 15);
    }

    #[test]
    fn test_load_reports_path_on_bad_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("strand.toml");
        fs::write(&path, "spin_limit = [1, 2]\n").unwrap();

        let err = SyncConfig::load(&path).unwrap_err();
        assert!(matches!(err, SyncError::Config { .. }));
        assert!(err.to_string().contains("strand.toml"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let err = SyncConfig::load(&temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SyncError::Io(_)));
    }
}
