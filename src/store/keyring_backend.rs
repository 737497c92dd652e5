//! OS 키체인/키링 백엔드
//!
//! `keyring` 크레이트로 macOS Keychain, Secret Service, Windows Credential Manager에 접근합니다.
//! keyring의 쓰기는 항상 덮어쓰기이므로 add/update의 존재 여부 조건은 여기서 검사합니다.

use keyring::Entry;

use super::{Account, SecretBackend};
use crate::error::KeychainError;

pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, account: &Account) -> Result<Entry, KeychainError> {
        Entry::new(&self.service, account.as_str())
            .map_err(|e| KeychainError::Platform(format!("Failed to create keyring entry: {}", e)))
    }

    fn exists(entry: &Entry) -> Result<bool, KeychainError> {
        match entry.get_password() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            // 값이 UTF-8이 아니어도 엔트리는 존재함
            Err(keyring::Error::BadEncoding(_)) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    fn password(secret: &[u8]) -> Result<&str, KeychainError> {
        std::str::from_utf8(secret)
            .map_err(|e| KeychainError::Platform(format!("Keyring values must be UTF-8: {}", e)))
    }
}

impl SecretBackend for KeyringBackend {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn add(&self, account: &Account, secret: &[u8]) -> Result<(), KeychainError> {
        let entry = self.entry(account)?;
        if Self::exists(&entry)? {
            return Err(KeychainError::AlreadyExists);
        }
        entry.set_password(Self::password(secret)?)?;
        Ok(())
    }

    fn copy_matching(&self, account: &Account) -> Result<Vec<u8>, KeychainError> {
        let entry = self.entry(account)?;
        match entry.get_password() {
            Ok(password) => Ok(password.into_bytes()),
            Err(keyring::Error::BadEncoding(raw)) => Ok(raw),
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, account: &Account, secret: &[u8]) -> Result<(), KeychainError> {
        let entry = self.entry(account)?;
        if !Self::exists(&entry)? {
            return Err(KeychainError::NotFound);
        }
        entry.set_password(Self::password(secret)?)?;
        Ok(())
    }

    fn delete(&self, account: &Account) -> Result<(), KeychainError> {
        let entry = self.entry(account)?;
        entry.delete_password()?;
        Ok(())
    }
}
