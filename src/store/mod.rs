//! Secret Entry Store
//!
//! `{bundle_id}.{key}` 형태의 계정(account)으로 시크릿 하나를 저장/조회/수정/삭제합니다.
//!
//! - 실제 상태는 백엔드(OS 키체인, vault 파일, 메모리)에만 존재
//! - 스토어는 값 캐시를 두지 않음
//! - 같은 계정에 대한 연산은 계정별 락으로 직렬화 (upsert 경쟁 방지)

pub mod keyring_backend;
pub mod memory;
pub mod vault;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::KeychainError;

pub use keyring_backend::KeyringBackend;
pub use memory::MemoryBackend;
pub use vault::VaultBackend;

/// 번들 ID를 알 수 없을 때 사용하는 기본 네임스페이스
pub const DEFAULT_BUNDLE_ID: &str = "keymaster";

/// 백엔드 조회 키 (`bundle_id.key`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Account(String);

impl Account {
    pub fn new(bundle_id: &str, key: &str) -> Self {
        Account(format!("{}.{}", bundle_id, key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 플랫폼 보안 저장소 기능 인터페이스
///
/// generic-password 클래스의 네 가지 원시 연산만 요구합니다.
/// 값은 UTF-8 문자열의 원시 바이트입니다.
pub trait SecretBackend: Send + Sync {
    /// 백엔드 이름 (로그용)
    fn name(&self) -> &'static str;

    /// 새 엔트리 추가. 이미 있으면 `AlreadyExists`.
    fn add(&self, account: &Account, secret: &[u8]) -> Result<(), KeychainError>;

    /// 엔트리 조회. 없으면 `NotFound`.
    fn copy_matching(&self, account: &Account) -> Result<Vec<u8>, KeychainError>;

    /// 기존 엔트리 값 교체. 없으면 `NotFound`.
    fn update(&self, account: &Account, secret: &[u8]) -> Result<(), KeychainError>;

    /// 엔트리 삭제. 없으면 `NotFound`.
    fn delete(&self, account: &Account) -> Result<(), KeychainError>;
}

/// Secret Entry Store
///
/// bool/Option 표면은 원래 플러그인 동작을 그대로 유지하고,
/// `try_*` 메서드는 실패 원인(not-found / platform-error 등)을 구분해 반환합니다.
pub struct SecretStore {
    bundle_id: String,
    backend: Arc<dyn SecretBackend>,
    /// 계정별 락 (사용 중인 계정만 유지)
    locks: Mutex<HashMap<Account, Arc<Mutex<()>>>>,
}

impl SecretStore {
    pub fn new(bundle_id: impl Into<String>, backend: Arc<dyn SecretBackend>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            backend,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn account(&self, key: &str) -> Account {
        Account::new(&self.bundle_id, key)
    }

    // =====================================
    // 태그된 결과 API
    // =====================================

    /// 새 엔트리 생성. 기존 엔트리를 덮어쓰지 않음.
    pub fn try_set(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        let account = self.account(key);
        self.with_account_lock(&account, || self.backend.add(&account, value.as_bytes()))
    }

    /// 저장된 값 조회
    pub fn try_fetch(&self, key: &str) -> Result<String, KeychainError> {
        let account = self.account(key);
        self.with_account_lock(&account, || self.read(&account))
    }

    /// 기존 엔트리 값 교체
    pub fn try_update(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        let account = self.account(key);
        self.with_account_lock(&account, || self.backend.update(&account, value.as_bytes()))
    }

    /// 엔트리 삭제
    pub fn try_delete(&self, key: &str) -> Result<(), KeychainError> {
        let account = self.account(key);
        self.with_account_lock(&account, || self.backend.delete(&account))
    }

    /// fetch 후 없으면 add, 있으면 update
    ///
    /// 조회와 쓰기 사이에 같은 프로세스의 다른 연산이 끼어들지 않도록
    /// 계정 락을 잡은 채로 수행합니다. 다른 프로세스와의 경쟁은 막지 못합니다.
    pub fn try_upsert(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        let account = self.account(key);
        self.with_account_lock(&account, || match self.read(&account) {
            Err(KeychainError::NotFound) | Err(KeychainError::Encoding(_)) => {
                tracing::debug!(account = %account, "upsert: no readable entry, adding");
                self.backend.add(&account, value.as_bytes())
            }
            Err(e) => Err(e),
            Ok(_) => {
                tracing::debug!(account = %account, "upsert: entry exists, updating");
                self.backend.update(&account, value.as_bytes())
            }
        })
    }

    // =====================================
    // bool/Option 표면 (채널 경계용)
    // =====================================

    pub fn set(&self, key: &str, value: &str) -> bool {
        Self::report("set", key, self.try_set(key, value))
    }

    pub fn fetch(&self, key: &str) -> Option<String> {
        match self.try_fetch(key) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "fetch returned no value");
                None
            }
        }
    }

    pub fn update(&self, key: &str, value: &str) -> bool {
        Self::report("update", key, self.try_update(key, value))
    }

    pub fn delete(&self, key: &str) -> bool {
        Self::report("delete", key, self.try_delete(key))
    }

    pub fn upsert(&self, key: &str, value: &str) -> bool {
        Self::report("upsert", key, self.try_upsert(key, value))
    }

    fn report(op: &str, key: &str, result: Result<(), KeychainError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(
                    op,
                    key,
                    code = e.code(),
                    error = %e,
                    "secret store operation failed"
                );
                false
            }
        }
    }

    fn read(&self, account: &Account) -> Result<String, KeychainError> {
        let bytes = self.backend.copy_matching(account)?;
        Ok(String::from_utf8(bytes)?)
    }

    fn with_account_lock<T>(
        &self,
        account: &Account,
        op: impl FnOnce() -> Result<T, KeychainError>,
    ) -> Result<T, KeychainError> {
        let slot = {
            let mut locks = lock_ignoring_poison(&self.locks);
            locks
                .entry(account.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let result = {
            let _guard = lock_ignoring_poison(&slot);
            op()
        };

        // 다른 호출자가 없으면 락 엔트리 정리
        let mut locks = lock_ignoring_poison(&self.locks);
        if Arc::strong_count(&slot) == 2 {
            locks.remove(account);
        }

        result
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        lock_ignoring_poison(&self.locks).len()
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
