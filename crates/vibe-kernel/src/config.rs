//! Kernel configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional JSON
//! file, then command-line flags (applied by the binary).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use vibe_eval::{DEFAULT_MAX_DEPTH, MAX_DEPTH_CEILING};

use crate::error::{KernelError, KernelResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KernelConfig {
    /// Name reported as the kernel implementation.
    pub kernel_name: String,

    /// Guest call depth at which `RecursionError` is raised. At most
    /// [`MAX_DEPTH_CEILING`].
    pub max_call_depth: usize,

    /// Replaces the default `kernel_info` banner when set.
    pub banner: Option<String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            kernel_name: "vibekernel".to_string(),
            max_call_depth: DEFAULT_MAX_DEPTH,
            banner: None,
        }
    }
}

impl KernelConfig {
    pub fn from_json(text: &str) -> KernelResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> KernelResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> KernelResult<()> {
        if self.max_call_depth == 0 {
            return Err(KernelError::Config("max_call_depth must be at least 1".into()));
        }
        if self.max_call_depth > MAX_DEPTH_CEILING {
            return Err(KernelError::Config(format!(
                "max_call_depth must be at most {MAX_DEPTH_CEILING}"
            )));
        }
        if self.kernel_name.trim().is_empty() {
            return Err(KernelError::Config("kernel_name must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = KernelConfig::from_json(r#"{"max_call_depth": 50}"#).unwrap();
        assert_eq!(config.max_call_depth, 50);
        assert_eq!(config.kernel_name, "vibekernel");
        assert_eq!(config.banner, None);
    }

    #[test]
    fn zero_depth_is_rejected() {
        let err = KernelConfig::from_json(r#"{"max_call_depth": 0}"#).unwrap_err();
        assert!(matches!(err, KernelError::Config(_)));
    }

    #[test]
    fn depth_above_ceiling_is_rejected() {
        let text = format!(r#"{{"max_call_depth": {}}}"#, MAX_DEPTH_CEILING + 1);
        let err = KernelConfig::from_json(&text).unwrap_err();
        assert!(matches!(err, KernelError::Config(_)));

        let text = format!(r#"{{"max_call_depth": {MAX_DEPTH_CEILING}}}"#);
        assert!(KernelConfig::from_json(&text).is_ok());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            KernelConfig::from_json(r#"{"depth": 3}"#),
            Err(KernelError::Json(_))
        ));
    }
}
