//! 플랫폼 버전 채널 플러그인

use once_cell::sync::Lazy;
use sysinfo::System;

use crate::channel::{MethodCall, MethodCallHandler, MethodResponse};

/// 채널 이름
pub const PLATFORM_CHANNEL: &str = "tbdex_flutter";

/// `"{OS 이름} {OS 버전}"` (프로세스 수명 동안 고정)
static PLATFORM_VERSION: Lazy<String> = Lazy::new(|| {
    platform_version_string(System::name(), System::os_version())
});

fn platform_version_string(name: Option<String>, version: Option<String>) -> String {
    let name = name.unwrap_or_else(|| std::env::consts::OS.to_string());
    match version {
        Some(version) if !version.trim().is_empty() => format!("{} {}", name, version.trim()),
        _ => name,
    }
}

pub fn platform_version() -> &'static str {
    &PLATFORM_VERSION
}

#[derive(Default)]
pub struct PlatformPlugin;

impl PlatformPlugin {
    pub fn new() -> Self {
        PlatformPlugin
    }
}

impl MethodCallHandler for PlatformPlugin {
    fn handle(&self, call: &MethodCall) -> MethodResponse {
        match call.method.as_str() {
            "getPlatformVersion" => MethodResponse::success(platform_version()),
            _ => MethodResponse::NotImplemented,
        }
    }
}
