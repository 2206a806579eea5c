use crate::logging::{default_log_level, normalize_level, normalize_log_dir};
use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "RECORDSD_WORKSPACE";
pub const ENV_LOG_LEVEL: &str = "RECORDSD_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "RECORDSD_LOG_DIR";

/// Start-up settings. The workspace can still be changed later through
/// `workspace.select`; logging is fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub workspace: Option<PathBuf>,
    pub log_level: &'static str,
    /// `None` leaves logging disabled.
    pub log_dir: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> (Self, Vec<String>) {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from a variable lookup. Invalid values fall back to
    /// defaults and are returned as warnings for the caller to report.
    pub fn from_lookup<F>(lookup: F) -> (Self, Vec<String>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let workspace = non_blank(ENV_WORKSPACE).map(|v| PathBuf::from(v.trim()));

        let log_level = match non_blank(ENV_LOG_LEVEL) {
            None => default_log_level(),
            Some(raw) => normalize_level(&raw).unwrap_or_else(|e| {
                warnings.push(format!("{ENV_LOG_LEVEL}: {e}"));
                default_log_level()
            }),
        };

        let default_dir = || workspace.as_ref().map(|w| w.join("logs"));
        let log_dir = match non_blank(ENV_LOG_DIR) {
            None => default_dir(),
            Some(raw) => match normalize_log_dir(&raw) {
                Ok(dir) => Some(dir),
                Err(e) => {
                    warnings.push(format!("{ENV_LOG_DIR}: {e}"));
                    default_dir()
                }
            },
        };

        (
            Self {
                workspace,
                log_level,
                log_dir,
            },
            warnings,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let (cfg, warnings) = DaemonConfig::from_lookup(lookup(&[]));
        assert!(warnings.is_empty());
        assert_eq!(cfg.workspace, None);
        assert_eq!(cfg.log_dir, None);
        assert_eq!(cfg.log_level, default_log_level());
    }

    #[test]
    fn log_dir_defaults_under_workspace() {
        let (cfg, _) = DaemonConfig::from_lookup(lookup(&[
            (ENV_WORKSPACE, "/srv/records"),
            (ENV_LOG_LEVEL, "WARN"),
        ]));
        assert_eq!(cfg.workspace, Some(PathBuf::from("/srv/records")));
        assert_eq!(cfg.log_dir, Some(PathBuf::from("/srv/records/logs")));
        assert_eq!(cfg.log_level, "warn");
    }

    #[test]
    fn invalid_values_fall_back_with_warnings() {
        let (cfg, warnings) = DaemonConfig::from_lookup(lookup(&[
            (ENV_LOG_LEVEL, "loud"),
            (ENV_LOG_DIR, "relative/logs"),
        ]));
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with(ENV_LOG_LEVEL));
        assert_eq!(cfg.log_level, default_log_level());
        assert_eq!(cfg.log_dir, None);
    }
}
