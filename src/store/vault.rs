//! 암호화된 vault 파일 백엔드
//!
//! 파일 포맷 (v1):
//! - magic: `KCBVLT01` (8 bytes)
//! - nonce: 24 bytes (XChaCha20-Poly1305)
//! - ciphertext: AEAD 결과 (= 암호문 + 태그)
//!
//! AAD: magic (포맷 바인딩)
//!
//! 마스터키는 직접 주입하거나 OS 키링에 base64로 보관합니다.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use keyring::Entry;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{lock_ignoring_poison, Account, SecretBackend};
use crate::error::KeychainError;

/// 파일 매직 (8 bytes)
pub const VAULT_MAGIC: &[u8; 8] = b"KCBVLT01";

/// 마스터키 길이 (256-bit)
pub const MASTER_KEY_LEN: usize = 32;

/// Nonce 길이 (XChaCha20-Poly1305용 24 bytes)
pub const NONCE_LEN: usize = 24;

/// 키링에 마스터키를 보관할 때 사용하는 계정명
pub const MASTER_KEY_ACCOUNT: &str = "vault:master_key_v1";

/// Vault 오류
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid vault magic")]
    InvalidMagic,

    #[error("Invalid vault format: {0}")]
    InvalidFormat(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Vault에 저장되는 페이로드
///
/// 키는 account 문자열, 값은 원시 바이트의 base64.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VaultPayload {
    pub entries: HashMap<String, String>,
    /// 페이로드 버전 (향후 마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

/// Drop 시 zeroize 되는 마스터키
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; MASTER_KEY_LEN]);

impl MasterKey {
    pub fn from_bytes(bytes: [u8; MASTER_KEY_LEN]) -> Self {
        MasterKey(bytes)
    }

    /// CSPRNG로 새 마스터키 생성
    pub fn generate() -> Self {
        let mut key = MasterKey([0u8; MASTER_KEY_LEN]);
        rand::thread_rng().fill(&mut key.0);
        key
    }

    /// OS 키링에서 마스터키 로드 (없으면 생성하고 저장)
    pub fn load_or_create(service: &str) -> Result<Self, KeychainError> {
        let entry = Entry::new(service, MASTER_KEY_ACCOUNT)?;

        match entry.get_password() {
            Ok(encoded) => {
                tracing::debug!(service, "vault master key loaded from keyring");
                Self::decode(&encoded)
            }
            Err(keyring::Error::NoEntry) => {
                tracing::info!(service, "no vault master key found, generating a new one");
                let key = Self::generate();
                entry.set_password(&key.encode())?;
                Ok(key)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn encode(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn decode(encoded: &str) -> Result<Self, KeychainError> {
        let mut bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| KeychainError::InvalidMasterKey)?;

        if bytes.len() != MASTER_KEY_LEN {
            bytes.zeroize();
            return Err(KeychainError::InvalidMasterKey);
        }

        let mut key = [0u8; MASTER_KEY_LEN];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        let master_key = MasterKey(key);
        key.zeroize();
        Ok(master_key)
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new((&self.0).into())
    }
}

/// 마스터키로 페이로드를 암호화하고 vault 파일에 저장
pub fn encrypt_and_write(
    path: &Path,
    master_key: &MasterKey,
    payload: &VaultPayload,
) -> Result<(), VaultError> {
    let mut plaintext = serde_json::to_vec(payload)?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill(&mut nonce);

    let ciphertext = master_key
        .cipher()
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext.as_ref(),
                aad: VAULT_MAGIC,
            },
        )
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()));
    plaintext.zeroize();
    let ciphertext = ciphertext?;

    // Atomic write: 임시 파일에 쓰고 rename
    let tmp_path = path.with_extension("vault.tmp");

    let written = write_vault_file(&tmp_path, &nonce, &ciphertext)
        .and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        // 실패한 임시 파일은 남기지 않음
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(())
}

fn write_vault_file(
    path: &Path,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(VAULT_MAGIC)?;
    file.write_all(nonce)?;
    file.write_all(ciphertext)?;
    file.sync_all()
}

/// Vault 파일을 읽고 마스터키로 복호화
pub fn read_and_decrypt(path: &Path, master_key: &MasterKey) -> Result<VaultPayload, VaultError> {
    let mut file = fs::File::open(path)?;

    let mut magic = [0u8; 8];
    file.read_exact(&mut magic)?;
    if &magic != VAULT_MAGIC {
        return Err(VaultError::InvalidMagic);
    }

    let mut nonce = [0u8; NONCE_LEN];
    file.read_exact(&mut nonce).map_err(|_| {
        VaultError::InvalidFormat("vault file is truncated before the nonce".to_string())
    })?;

    // 나머지 = ciphertext
    let mut ciphertext = Vec::new();
    file.read_to_end(&mut ciphertext)?;

    let mut plaintext = master_key
        .cipher()
        .decrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: ciphertext.as_ref(),
                aad: VAULT_MAGIC,
            },
        )
        .map_err(|e| VaultError::DecryptionFailed(e.to_string()))?;

    let payload: Result<VaultPayload, _> = serde_json::from_slice(&plaintext);

    // 평문 메모리 지우기
    plaintext.zeroize();

    Ok(payload?)
}

/// 데이터 디렉토리 기반 vault 경로 생성
pub fn get_vault_path(data_dir: &Path) -> PathBuf {
    data_dir.join("keychain.vault")
}

/// 암호화 파일 백엔드
///
/// 열 때 파일 전체를 복호화해 메모리에 두고, 변경마다 파일 전체를 다시 씁니다.
pub struct VaultBackend {
    path: PathBuf,
    master_key: MasterKey,
    payload: Mutex<VaultPayload>,
}

impl VaultBackend {
    /// vault 파일 열기 (없으면 빈 vault로 시작)
    pub fn open(path: impl Into<PathBuf>, master_key: MasterKey) -> Result<Self, KeychainError> {
        let path = path.into();

        let payload = if path.exists() {
            let payload = read_and_decrypt(&path, &master_key)?;
            tracing::info!(path = %path.display(), entries = payload.entries.len(), "vault loaded");
            payload
        } else {
            tracing::info!(path = %path.display(), "no existing vault, starting fresh");
            VaultPayload {
                version: default_version(),
                ..Default::default()
            }
        };

        Ok(Self {
            path,
            master_key,
            payload: Mutex::new(payload),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 변경을 적용하고 파일에 저장. 저장 실패 시 메모리 상태는 되돌림.
    fn mutate(
        &self,
        change: impl FnOnce(&mut HashMap<String, String>) -> Result<(), KeychainError>,
    ) -> Result<(), KeychainError> {
        let mut payload = lock_ignoring_poison(&self.payload);
        let mut next = payload.clone();
        change(&mut next.entries)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(VaultError::from)?;
            }
        }
        encrypt_and_write(&self.path, &self.master_key, &next)?;

        *payload = next;
        Ok(())
    }
}

impl SecretBackend for VaultBackend {
    fn name(&self) -> &'static str {
        "vault"
    }

    fn add(&self, account: &Account, secret: &[u8]) -> Result<(), KeychainError> {
        self.mutate(|entries| {
            if entries.contains_key(account.as_str()) {
                return Err(KeychainError::AlreadyExists);
            }
            entries.insert(account.to_string(), BASE64.encode(secret));
            Ok(())
        })
    }

    fn copy_matching(&self, account: &Account) -> Result<Vec<u8>, KeychainError> {
        let payload = lock_ignoring_poison(&self.payload);
        let encoded = payload
            .entries
            .get(account.as_str())
            .ok_or(KeychainError::NotFound)?;
        BASE64.decode(encoded).map_err(|e| {
            KeychainError::Vault(VaultError::InvalidFormat(format!(
                "entry {} is not base64: {}",
                account, e
            )))
        })
    }

    fn update(&self, account: &Account, secret: &[u8]) -> Result<(), KeychainError> {
        self.mutate(|entries| {
            let slot = entries
                .get_mut(account.as_str())
                .ok_or(KeychainError::NotFound)?;
            *slot = BASE64.encode(secret);
            Ok(())
        })
    }

    fn delete(&self, account: &Account) -> Result<(), KeychainError> {
        self.mutate(|entries| {
            entries
                .remove(account.as_str())
                .map(|_| ())
                .ok_or(KeychainError::NotFound)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("test.vault");
        let master_key = MasterKey::generate();

        let mut payload = VaultPayload::default();
        payload
            .entries
            .insert("com.example.token".to_string(), BASE64.encode("abc"));

        encrypt_and_write(&vault_path, &master_key, &payload).unwrap();
        assert!(vault_path.exists());

        let decrypted = read_and_decrypt(&vault_path, &master_key).unwrap();
        assert_eq!(
            decrypted.entries.get("com.example.token"),
            Some(&BASE64.encode("abc"))
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("test.vault");

        encrypt_and_write(&vault_path, &MasterKey::generate(), &VaultPayload::default()).unwrap();

        let result = read_and_decrypt(&vault_path, &MasterKey::generate());
        assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("test.vault");
        fs::write(&vault_path, b"NOTAVAULT-and-some-more-bytes-here").unwrap();

        let result = VaultBackend::open(&vault_path, MasterKey::generate());
        assert!(matches!(
            result,
            Err(KeychainError::Vault(VaultError::InvalidMagic))
        ));
    }

    #[test]
    fn test_master_key_encoding() {
        let key = MasterKey::from_bytes([7u8; MASTER_KEY_LEN]);
        let decoded = MasterKey::decode(&key.encode()).unwrap();
        assert_eq!(decoded.0, key.0);

        assert!(matches!(
            MasterKey::decode("c2hvcnQ="),
            Err(KeychainError::InvalidMasterKey)
        ));
        assert!(matches!(
            MasterKey::decode("not base64!"),
            Err(KeychainError::InvalidMasterKey)
        ));
    }

    #[test]
    fn test_backend_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let vault_path = get_vault_path(dir.path());
        let key = MasterKey::generate();
        let account = Account::new("com.example", "token");

        {
            let backend = VaultBackend::open(&vault_path, key.clone()).unwrap();
            backend.add(&account, b"abc").unwrap();
            backend.update(&account, b"xyz").unwrap();
        }

        let reopened = VaultBackend::open(&vault_path, key).unwrap();
        assert_eq!(reopened.copy_matching(&account).unwrap(), b"xyz");
        assert!(matches!(
            reopened.add(&account, b"again"),
            Err(KeychainError::AlreadyExists)
        ));
        reopened.delete(&account).unwrap();
        assert!(reopened.copy_matching(&account).unwrap_err().is_not_found());
    }

    #[test]
    fn test_failed_write_keeps_previous_state() {
        let dir = tempdir().unwrap();
        // 상위 경로가 파일이라 디렉토리 생성이 실패함
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let backend =
            VaultBackend::open(blocker.join("keychain.vault"), MasterKey::generate()).unwrap();
        let account = Account::new("com.example", "token");

        assert!(matches!(
            backend.add(&account, b"abc"),
            Err(KeychainError::Vault(VaultError::Io(_)))
        ));
        assert!(backend.copy_matching(&account).unwrap_err().is_not_found());
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = tempdir().unwrap();
        // 대상 경로가 디렉토리라 rename이 실패함
        let vault_path = dir.path().join("keychain.vault");
        fs::create_dir(&vault_path).unwrap();

        let result =
            encrypt_and_write(&vault_path, &MasterKey::generate(), &VaultPayload::default());
        assert!(matches!(result, Err(VaultError::Io(_))));
        assert!(!vault_path.with_extension("vault.tmp").exists());
        assert!(vault_path.is_dir());
    }

    #[test]
    fn test_backend_reports_path() {
        let dir = tempdir().unwrap();
        let vault_path = get_vault_path(dir.path());
        let backend = VaultBackend::open(&vault_path, MasterKey::generate()).unwrap();
        assert_eq!(backend.path(), vault_path.as_path());
    }
}
