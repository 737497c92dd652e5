//! 채널 플러그인
//!
//! - `web5.keychain`: 보안 저장소 set/fetch/delete
//! - `tbdex_flutter`: 플랫폼 버전 조회

pub mod keychain;
pub mod platform;

pub use keychain::{KeychainPlugin, KEYCHAIN_CHANNEL};
pub use platform::{PlatformPlugin, PLATFORM_CHANNEL};
