//! Keychain Bridge Error Types
//!
//! 보안 저장소 전역 에러 타입 정의

use serde::Serialize;
use thiserror::Error;

use crate::store::vault::VaultError;

/// 보안 저장소 에러
///
/// 채널 경계에서는 bool/null로 축약되지만, `try_*` API에서는 원인이 그대로 전달됩니다.
#[derive(Error, Debug)]
pub enum KeychainError {
    #[error("Secret entry not found")]
    NotFound,

    #[error("Secret entry already exists")]
    AlreadyExists,

    #[error("Stored value is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Platform keystore error: {0}")]
    Platform(String),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Invalid master key format")]
    InvalidMasterKey,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl KeychainError {
    /// 호스트에 노출되는 안정적인 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            KeychainError::NotFound => "NOT_FOUND",
            KeychainError::AlreadyExists => "ALREADY_EXISTS",
            KeychainError::Encoding(_) => "ENCODING_ERROR",
            KeychainError::Platform(_) => "PLATFORM_ERROR",
            KeychainError::Vault(_) => "VAULT_ERROR",
            KeychainError::InvalidMasterKey => "INVALID_MASTER_KEY",
            KeychainError::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KeychainError::NotFound)
    }
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoEntry => KeychainError::NotFound,
            other => KeychainError::Platform(other.to_string()),
        }
    }
}

/// 호스트 응답용 직렬화 가능한 에러
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl CommandError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        CommandError {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl From<KeychainError> for CommandError {
    fn from(error: KeychainError) -> Self {
        CommandError {
            code: error.code().to_string(),
            message: error.to_string(),
            details: None,
        }
    }
}

/// 호스트 명령 결과 타입
pub type CommandResult<T> = Result<T, CommandError>;
