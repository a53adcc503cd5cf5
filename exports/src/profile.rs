use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use fetchguard_syscalls::{SyscallNr, DEFAULT_IGNORED};
use fetchguard_tracker::{ScanPolicy, TrackerLimits};

/// Environment variable tools consult for a profile path.
pub const PROFILE_ENV_VAR: &str = "FETCHGUARD_PROFILE";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("could not read engine profile: {0}")]
    FileRead(#[from] io::Error),

    #[error("could not parse engine profile: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn read_engine_profile(path: impl AsRef<Path>) -> Result<EngineProfile, ProfileError> {
    let contents = std::fs::read_to_string(path)?;
    EngineProfile::from_toml_str(&contents)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineProfile {
    /// Ask for the tampering context to be terminated, not just corrected.
    #[serde(default)]
    pub kill_on_tamper: bool,

    #[serde(default = "default_ignored_syscalls")]
    pub ignored_syscalls: Vec<SyscallNr>,

    #[serde(default)]
    pub tracked_bytes_limit: Option<usize>,

    #[serde(default)]
    pub scan_policy: ScanPolicy,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

impl EngineProfile {
    pub fn from_toml_str(contents: &str) -> Result<Self, ProfileError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn tracker_limits(&self) -> TrackerLimits {
        TrackerLimits {
            tracked_bytes: self.tracked_bytes_limit,
            policy: self.scan_policy,
        }
    }
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self {
            kill_on_tamper: false,
            ignored_syscalls: default_ignored_syscalls(),
            tracked_bytes_limit: None,
            scan_policy: ScanPolicy::default(),
            log_file: default_log_file(),
        }
    }
}

fn default_ignored_syscalls() -> Vec<SyscallNr> {
    DEFAULT_IGNORED.to_vec()
}

fn default_log_file() -> String {
    "log/fetchguard.log".to_string()
}

#[cfg(test)]
mod tests {
    use fetchguard_syscalls::SyscallNr;
    use fetchguard_tracker::ScanPolicy;

    use crate::profile::{EngineProfile, ProfileError};

    #[test]
    fn empty_profile_uses_defaults() {
        let profile = EngineProfile::from_toml_str("").unwrap();

        assert_eq!(profile, EngineProfile::default());
        assert_eq!(profile.ignored_syscalls, vec![SyscallNr(1), SyscallNr(59), SyscallNr(202)]);
        assert!(!profile.kill_on_tamper);
    }

    #[test]
    fn syscalls_can_be_named() {
        let profile = EngineProfile::from_toml_str(r#"
            kill_on_tamper = true
            ignored_syscalls = ["futex", "ioctl"]
            tracked_bytes_limit = 65536
            scan_policy = "all-overlapping"
        "#).unwrap();

        assert!(profile.kill_on_tamper);
        assert_eq!(profile.ignored_syscalls, vec![SyscallNr(202), SyscallNr(16)]);
        assert_eq!(profile.tracker_limits().tracked_bytes, Some(65536));
        assert_eq!(profile.scan_policy, ScanPolicy::AllOverlapping);
    }

    #[test]
    fn syscalls_can_be_numbered() {
        let profile = EngineProfile::from_toml_str("ignored_syscalls = [99, 400]").unwrap();

        assert_eq!(profile.ignored_syscalls, vec![SyscallNr(99), SyscallNr(400)]);
    }

    #[test]
    fn unknown_syscall_names_are_rejected() {
        let result = EngineProfile::from_toml_str(r#"ignored_syscalls = ["frobnicate"]"#);

        assert!(matches!(result.unwrap_err(), ProfileError::Parse(_)));
    }

    #[test]
    fn missing_profile_files_are_reported() {
        let result = crate::profile::read_engine_profile("/nonexistent/fetchguard.toml");

        assert!(matches!(result.unwrap_err(), ProfileError::FileRead(_)));
    }
}
