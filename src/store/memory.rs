//! 프로세스 메모리 백엔드
//!
//! 테스트나 OS 키체인이 없는 호스트용. 삭제/교체/드롭 시 값은 zeroize 됩니다.

use std::collections::HashMap;
use std::sync::Mutex;

use zeroize::Zeroizing;

use super::{lock_ignoring_poison, Account, SecretBackend};
use crate::error::KeychainError;

#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<Account, Zeroizing<Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock_ignoring_poison(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn add(&self, account: &Account, secret: &[u8]) -> Result<(), KeychainError> {
        let mut entries = lock_ignoring_poison(&self.entries);
        if entries.contains_key(account) {
            return Err(KeychainError::AlreadyExists);
        }
        entries.insert(account.clone(), Zeroizing::new(secret.to_vec()));
        Ok(())
    }

    fn copy_matching(&self, account: &Account) -> Result<Vec<u8>, KeychainError> {
        lock_ignoring_poison(&self.entries)
            .get(account)
            .map(|value| value.to_vec())
            .ok_or(KeychainError::NotFound)
    }

    fn update(&self, account: &Account, secret: &[u8]) -> Result<(), KeychainError> {
        let mut entries = lock_ignoring_poison(&self.entries);
        let slot = entries.get_mut(account).ok_or(KeychainError::NotFound)?;
        *slot = Zeroizing::new(secret.to_vec());
        Ok(())
    }

    fn delete(&self, account: &Account) -> Result<(), KeychainError> {
        lock_ignoring_poison(&self.entries)
            .remove(account)
            .map(|_| ())
            .ok_or(KeychainError::NotFound)
    }
}
