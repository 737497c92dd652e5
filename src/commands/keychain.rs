//! Keychain Tauri 명령어
//!
//! 프론트엔드는 채널 호출(`invoke_method`)이나 타입이 있는 개별 명령 중 하나를 사용합니다.
//! 개별 명령도 채널과 같은 bool/null 의미를 따릅니다.

use serde_json::Value;
use tauri::State;

use crate::bridge::Bridge;
use crate::channel::MethodCall;
use crate::error::{CommandError, CommandResult};
use crate::plugins::platform;

fn blocking_failed(err: tokio::task::JoinError) -> CommandError {
    CommandError::new("HANDLER_FAILED", format!("Keychain task failed: {}", err))
}

/// 채널 메서드 호출
#[tauri::command]
pub async fn invoke_method(
    bridge: State<'_, Bridge>,
    channel: String,
    method: String,
    arguments: Option<Value>,
) -> CommandResult<Value> {
    let call = MethodCall::new(method.clone(), arguments.unwrap_or(Value::Null));
    bridge
        .invoke(&channel, call)
        .await
        .into_command_result(&channel, &method)
}

/// 시크릿 저장 (없으면 추가, 있으면 수정)
#[tauri::command]
pub async fn keychain_set(
    bridge: State<'_, Bridge>,
    key: String,
    value: String,
) -> CommandResult<bool> {
    let store = bridge.store();
    tokio::task::spawn_blocking(move || store.upsert(&key, &value))
        .await
        .map_err(blocking_failed)
}

/// 시크릿 조회
#[tauri::command]
pub async fn keychain_fetch(
    bridge: State<'_, Bridge>,
    key: String,
) -> CommandResult<Option<String>> {
    let store = bridge.store();
    tokio::task::spawn_blocking(move || store.fetch(&key))
        .await
        .map_err(blocking_failed)
}

/// 시크릿 삭제
#[tauri::command]
pub async fn keychain_delete(bridge: State<'_, Bridge>, key: String) -> CommandResult<bool> {
    let store = bridge.store();
    tokio::task::spawn_blocking(move || store.delete(&key))
        .await
        .map_err(blocking_failed)
}

/// 플랫폼 버전 문자열
#[tauri::command]
pub fn platform_version() -> String {
    platform::platform_version().to_string()
}
