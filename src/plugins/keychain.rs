//! Keychain 채널 플러그인
//!
//! | method | args | result |
//! |--------|------|--------|
//! | `delete` | `key` | bool |
//! | `fetch` | `key` | string / null |
//! | `set` | `key`, `value` | bool (없으면 추가, 있으면 수정) |
//!
//! 인자가 없거나 문자열이 아니면 에러 대신 null을 돌려줍니다.

use std::sync::Arc;

use serde_json::Value;

use crate::channel::{MethodCall, MethodCallHandler, MethodResponse};
use crate::store::SecretStore;

/// 채널 이름
pub const KEYCHAIN_CHANNEL: &str = "web5.keychain";

pub struct KeychainPlugin {
    store: Arc<SecretStore>,
}

impl KeychainPlugin {
    pub fn new(store: Arc<SecretStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SecretStore {
        &self.store
    }
}

impl MethodCallHandler for KeychainPlugin {
    fn handle(&self, call: &MethodCall) -> MethodResponse {
        match call.method.as_str() {
            "delete" => {
                let Some(key) = call.str_arg("key") else {
                    return MethodResponse::null();
                };
                MethodResponse::success(self.store.delete(key))
            }
            "fetch" => {
                let Some(key) = call.str_arg("key") else {
                    return MethodResponse::null();
                };
                match self.store.fetch(key) {
                    Some(value) => MethodResponse::success(value),
                    None => MethodResponse::Success(Value::Null),
                }
            }
            "set" => {
                let (Some(key), Some(value)) = (call.str_arg("key"), call.str_arg("value")) else {
                    return MethodResponse::null();
                };
                MethodResponse::success(self.store.upsert(key, value))
            }
            other => {
                tracing::debug!(method = other, "keychain method not implemented");
                MethodResponse::NotImplemented
            }
        }
    }
}
