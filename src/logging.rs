//! tracing 구독자 초기화

use tracing_subscriber::EnvFilter;

/// fmt 구독자를 설치합니다. `RUST_LOG`가 있으면 그 값이 우선합니다.
///
/// 이미 전역 구독자가 설치돼 있으면(호스트 앱이 먼저 설치한 경우 등) 아무것도 하지 않습니다.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
