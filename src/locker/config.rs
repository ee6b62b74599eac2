use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GateConfig {
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-3-pro-preview".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub max_case_members: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_case_members: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LockerConfig {
    pub gate: GateConfig,
    pub provider: ProviderConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLockerConfig {
    gate: Option<GateConfig>,
    provider: Option<ProviderConfig>,
    analysis: Option<AnalysisConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_opt_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn validate(cfg: &LockerConfig) -> Result<()> {
    if cfg.provider.url.trim().is_empty() {
        return Err(anyhow!("invalid provider url: cannot be empty"));
    }
    if cfg.provider.model.trim().is_empty() {
        return Err(anyhow!("invalid provider model: cannot be empty"));
    }
    if cfg.provider.timeout_secs == 0 {
        return Err(anyhow!("invalid provider timeout: must be >= 1 second"));
    }
    if cfg.analysis.max_case_members < 2 {
        return Err(anyhow!(
            "invalid max case members: a unified case needs at least 2 files"
        ));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("EVLOCK_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".evlock").join("evlock.toml"))
}

fn merge_file_config(base: &mut LockerConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialLockerConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse locker config {}: {err}", path.display()))?;
    if let Some(gate) = parsed.gate {
        base.gate = gate;
    }
    if let Some(provider) = parsed.provider {
        base.provider = provider;
    }
    if let Some(analysis) = parsed.analysis {
        base.analysis = analysis;
    }
    Ok(())
}

pub fn load_config() -> Result<LockerConfig> {
    let mut cfg = LockerConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.gate.secret = env_opt_string("EVLOCK_DELETE_SECRET", cfg.gate.secret);
    cfg.provider.url = env_or_string("EVLOCK_PROVIDER_URL", &cfg.provider.url);
    cfg.provider.model = env_or_string("EVLOCK_PROVIDER_MODEL", &cfg.provider.model);
    cfg.provider.api_key = env_opt_string("EVLOCK_PROVIDER_API_KEY", cfg.provider.api_key);
    cfg.provider.timeout_secs =
        env_or_u64("EVLOCK_PROVIDER_TIMEOUT_SECS", cfg.provider.timeout_secs);
    cfg.analysis.max_case_members =
        env_or_usize("EVLOCK_MAX_CASE_MEMBERS", cfg.analysis.max_case_members);

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = LockerConfig::default();
        validate(&cfg).expect("defaults validate");
        assert_eq!(cfg.analysis.max_case_members, 7);
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let mut cfg = LockerConfig::default();
        cfg.provider.timeout_secs = 0;
        assert!(validate(&cfg).is_err());

        let mut cfg = LockerConfig::default();
        cfg.analysis.max_case_members = 1;
        assert!(validate(&cfg).is_err());
    }
}
