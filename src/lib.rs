//! Keychain Bridge - 보안 저장소 플러그인 브리지
//!
//! 호스트 UI 레이어의 메서드 채널 호출을 OS 보안 저장소(Keychain/Keyring) 연산으로 연결합니다.
//!
//! - `web5.keychain`: `{bundle_id}.{key}` 계정에 문자열 시크릿 set/fetch/delete
//! - `tbdex_flutter`: `getPlatformVersion`
//!
//! 저장소 백엔드는 `SecretBackend` 트레이트 뒤에 있어 OS 키링, 암호화 vault 파일,
//! 메모리 중에서 설정으로 고릅니다.

pub mod bridge;
pub mod channel;
#[cfg(feature = "tauri-plugin")]
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod plugins;
pub mod store;

pub use bridge::Bridge;
pub use channel::{ChannelRegistry, MethodCall, MethodCallHandler, MethodResponse};
pub use config::{BackendKind, KeychainConfig};
pub use error::{CommandError, CommandResult, KeychainError};
pub use store::{Account, SecretBackend, SecretStore};

/// Tauri 플러그인 생성
///
/// setup 단계에서 환경 설정을 읽고 브리지를 구성해 앱 상태로 등록합니다.
#[cfg(feature = "tauri-plugin")]
pub fn init<R: tauri::Runtime>() -> tauri::plugin::TauriPlugin<R> {
    use tauri::Manager;

    tauri::plugin::Builder::new("keychain")
        .invoke_handler(tauri::generate_handler![
            commands::keychain::invoke_method,
            commands::keychain::keychain_set,
            commands::keychain::keychain_fetch,
            commands::keychain::keychain_delete,
            commands::keychain::platform_version,
        ])
        .setup(|app, _api| {
            let config = KeychainConfig::load()?;
            logging::init(&config.log_filter);

            let bridge = Bridge::from_config(&config)?;
            app.manage(bridge);

            Ok(())
        })
        .build()
}
