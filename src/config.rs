//! 브리지 설정
//!
//! 환경 변수에서 읽습니다. 읽기 전에 `.env.local` / `.env`를 로드하며,
//! strict 파서(dotenvy)가 실패하는 파일은 `KEY=VALUE` 라인만 골라 읽습니다.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::KeychainError;
use crate::store::DEFAULT_BUNDLE_ID;

pub const ENV_BUNDLE_ID: &str = "KEYCHAIN_BUNDLE_ID";
pub const ENV_SERVICE: &str = "KEYCHAIN_SERVICE";
pub const ENV_BACKEND: &str = "KEYCHAIN_BACKEND";
pub const ENV_VAULT_PATH: &str = "KEYCHAIN_VAULT_PATH";
pub const ENV_LOG: &str = "KEYCHAIN_LOG";

const DEFAULT_LOG_FILTER: &str = "info";

/// 시크릿 저장 백엔드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Keyring,
    Memory,
    Vault,
}

impl FromStr for BackendKind {
    type Err = KeychainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" | "keychain" => Ok(BackendKind::Keyring),
            "memory" => Ok(BackendKind::Memory),
            "vault" => Ok(BackendKind::Vault),
            other => Err(KeychainError::Config(format!("Unknown backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeychainConfig {
    /// 계정 네임스페이스 (`{bundle_id}.{key}`)
    pub bundle_id: String,
    /// 키링 서비스 이름 (기본값: bundle_id)
    pub service: String,
    pub backend: BackendKind,
    /// `BackendKind::Vault`일 때 필수
    pub vault_path: Option<PathBuf>,
    /// tracing EnvFilter 지시어
    pub log_filter: String,
}

impl Default for KeychainConfig {
    fn default() -> Self {
        Self {
            bundle_id: DEFAULT_BUNDLE_ID.to_string(),
            service: DEFAULT_BUNDLE_ID.to_string(),
            backend: BackendKind::Keyring,
            vault_path: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl KeychainConfig {
    /// .env 파일 로드 후 환경 변수에서 설정 구성
    pub fn load() -> Result<Self, KeychainError> {
        load_env_files();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 이름 → 값 조회 함수로 설정 구성 (비어 있는 값은 미설정 취급)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, KeychainError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bundle_id = get(ENV_BUNDLE_ID).unwrap_or_else(|| DEFAULT_BUNDLE_ID.to_string());
        let service = get(ENV_SERVICE).unwrap_or_else(|| bundle_id.clone());
        let backend = match get(ENV_BACKEND) {
            Some(name) => name.parse()?,
            None => BackendKind::Keyring,
        };
        let vault_path = get(ENV_VAULT_PATH).map(PathBuf::from);
        let log_filter = get(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let config = Self {
            bundle_id,
            service,
            backend,
            vault_path,
            log_filter,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), KeychainError> {
        if self.backend == BackendKind::Vault && self.vault_path.is_none() {
            return Err(KeychainError::Config(format!(
                "{} is required for the vault backend",
                ENV_VAULT_PATH
            )));
        }
        Ok(())
    }
}

fn is_valid_env_key(key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    key.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// `KEY=VALUE` 라인만 읽는 관대한 파서
///
/// 주석, 코드펜스, 설명 라인은 건너뜁니다. `export ` 접두사와 양쪽 따옴표는 제거합니다.
pub fn parse_env_lenient(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("```") {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line).trim();
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim();
        if !is_valid_env_key(key) {
            continue;
        }

        let mut value = v.trim().to_string();
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = value[1..value.len() - 1].to_string();
        }

        pairs.push((key.to_string(), value));
    }

    pairs
}

fn try_load_env_lenient(path: &Path) -> std::io::Result<usize> {
    let text = std::fs::read_to_string(path)?;
    let mut loaded = 0usize;

    for (key, value) in parse_env_lenient(&text) {
        // 이미 비어 있지 않은 값이 설정돼 있으면 덮어쓰지 않음
        if let Ok(existing) = std::env::var(&key) {
            if !existing.trim().is_empty() {
                continue;
            }
        }
        std::env::set_var(&key, value);
        loaded += 1;
    }

    Ok(loaded)
}

fn load_env_files() {
    for name in [".env.local", ".env"] {
        let path = Path::new(name);
        if !path.exists() {
            continue;
        }
        if dotenvy::from_path(path).is_ok() {
            tracing::debug!(file = name, "environment file loaded");
            continue;
        }
        match try_load_env_lenient(path) {
            Ok(loaded) => tracing::debug!(file = name, loaded, "environment file loaded leniently"),
            Err(e) => tracing::warn!(file = name, error = %e, "failed to read environment file"),
        }
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
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = KeychainConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, KeychainConfig::default());
        assert_eq!(config.bundle_id, "keymaster");
    }

    #[test]
    fn test_service_follows_bundle_id() {
        let config =
            KeychainConfig::from_lookup(lookup(&[(ENV_BUNDLE_ID, "com.example.wallet")])).unwrap();
        assert_eq!(config.service, "com.example.wallet");

        let config = KeychainConfig::from_lookup(lookup(&[
            (ENV_BUNDLE_ID, "com.example.wallet"),
            (ENV_SERVICE, "wallet-secrets"),
        ]))
        .unwrap();
        assert_eq!(config.service, "wallet-secrets");
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = KeychainConfig::from_lookup(lookup(&[(ENV_BUNDLE_ID, "   ")])).unwrap();
        assert_eq!(config.bundle_id, DEFAULT_BUNDLE_ID);
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("Memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!("keychain".parse::<BackendKind>().unwrap(), BackendKind::Keyring);
        let err = KeychainConfig::from_lookup(lookup(&[(ENV_BACKEND, "floppy")])).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_vault_requires_path() {
        assert!(KeychainConfig::from_lookup(lookup(&[(ENV_BACKEND, "vault")])).is_err());

        let config = KeychainConfig::from_lookup(lookup(&[
            (ENV_BACKEND, "vault"),
            (ENV_VAULT_PATH, "/tmp/keychain.vault"),
        ]))
        .unwrap();
        assert_eq!(config.vault_path, Some(PathBuf::from("/tmp/keychain.vault")));
    }

    #[test]
    fn test_lenient_parser_skips_noise() {
        let text = concat!(
            "# comment\n",
            "```bash\n",
            "export KEYCHAIN_BUNDLE_ID=\"com.example\"\n",
            "not a pair\n",
            "lower=skip\n",
            "KEYCHAIN_LOG='debug'\n",
            "```\n",
        );
        let pairs = parse_env_lenient(text);
        assert_eq!(
            pairs,
            vec![
                ("KEYCHAIN_BUNDLE_ID".to_string(), "com.example".to_string()),
                ("KEYCHAIN_LOG".to_string(), "debug".to_string()),
            ]
        );
    }

    #[test]
    fn test_lenient_loader_keeps_existing_values() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join(".env");
        std::fs::write(
            &env_path,
            "```\nKEYCHAIN_LENIENT_KEEP=new\nKEYCHAIN_LENIENT_BLANK=new\n```\n",
        )
        .unwrap();

        std::env::set_var("KEYCHAIN_LENIENT_KEEP", "keep");
        std::env::set_var("KEYCHAIN_LENIENT_BLANK", " ");

        let loaded = try_load_env_lenient(&env_path).unwrap();

        assert_eq!(loaded, 1);
        assert_eq!(std::env::var("KEYCHAIN_LENIENT_KEEP").unwrap(), "keep");
        assert_eq!(std::env::var("KEYCHAIN_LENIENT_BLANK").unwrap(), "new");
    }
}
