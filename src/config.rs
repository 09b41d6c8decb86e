use anyhow::{anyhow, Context};
use std::path::PathBuf;

pub const DEFAULT_LOG_FILTER: &str = "tutord=info";

/// Startup configuration read from the environment (and a `.env` file when
/// present). Business settings live in the workspace, not here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub demo: bool,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let demo = match non_empty("TUTORD_DEMO") {
            Some(raw) => parse_flag(&raw).with_context(|| format!("invalid TUTORD_DEMO={raw}"))?,
            None => false,
        };
        let log_filter = non_empty("TUTORD_LOG")
            .or_else(|| non_empty("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            workspace: non_empty("TUTORD_WORKSPACE").map(PathBuf::from),
            demo,
            log_filter,
        })
    }
}

fn parse_flag(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let c = config(&[]).expect("config");
        assert_eq!(c.workspace, None);
        assert!(!c.demo);
        assert_eq!(c.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn tutord_log_wins_over_rust_log() {
        let c = config(&[("RUST_LOG", "warn"), ("TUTORD_LOG", "tutord=debug")]).expect("config");
        assert_eq!(c.log_filter, "tutord=debug");
        let c = config(&[("RUST_LOG", "warn")]).expect("config");
        assert_eq!(c.log_filter, "warn");
    }

    #[test]
    fn demo_flag_is_parsed_strictly() {
        assert!(config(&[("TUTORD_DEMO", "yes")]).expect("config").demo);
        assert!(!config(&[("TUTORD_DEMO", "0")]).expect("config").demo);
        assert!(config(&[("TUTORD_DEMO", "maybe")]).is_err());
    }

    #[test]
    fn blank_workspace_is_ignored() {
        let c = config(&[("TUTORD_WORKSPACE", "  ")]).expect("config");
        assert_eq!(c.workspace, None);
        let c = config(&[("TUTORD_WORKSPACE", "/tmp/ws")]).expect("config");
        assert_eq!(c.workspace, Some(PathBuf::from("/tmp/ws")));
    }
}
