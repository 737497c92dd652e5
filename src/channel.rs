//! 메서드 채널
//!
//! 호스트 UI 레이어에서 오는 `(채널, 메서드, 인자)` 호출을 등록된 핸들러로 라우팅합니다.
//! 인자는 JSON 값이며, 응답은 성공 값 / 에러 / 미구현 중 하나입니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CommandError, CommandResult};

/// 채널로 들어온 메서드 호출
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// 문자열 인자 조회. 인자가 객체가 아니거나, 키가 없거나, 문자열이 아니면 None.
    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.arguments.as_object()?.get(name)?.as_str()
    }
}

/// 메서드 호출 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "payload", rename_all = "camelCase")]
pub enum MethodResponse {
    Success(Value),
    Error(CommandError),
    NotImplemented,
}

impl MethodResponse {
    pub fn success(value: impl Into<Value>) -> Self {
        MethodResponse::Success(value.into())
    }

    /// 인자 누락/타입 불일치 시 응답 (에러가 아닌 null)
    pub fn null() -> Self {
        MethodResponse::Success(Value::Null)
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, MethodResponse::NotImplemented)
    }

    /// 호스트 명령 결과로 변환. 미구현은 `NOT_IMPLEMENTED` 에러가 됩니다.
    pub fn into_command_result(self, channel: &str, method: &str) -> CommandResult<Value> {
        match self {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Error(err) => Err(err),
            MethodResponse::NotImplemented => Err(CommandError::new(
                "NOT_IMPLEMENTED",
                format!("Method {} is not implemented on channel {}", method, channel),
            )),
        }
    }
}

/// 채널 하나를 담당하는 플러그인 핸들러
pub trait MethodCallHandler: Send + Sync {
    fn handle(&self, call: &MethodCall) -> MethodResponse;
}

/// 채널 이름 → 핸들러
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    handlers: HashMap<String, Arc<dyn MethodCallHandler>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 핸들러 등록. 같은 이름이 있으면 교체합니다.
    pub fn register(&mut self, channel: impl Into<String>, handler: Arc<dyn MethodCallHandler>) {
        let channel = channel.into();
        tracing::debug!(channel = %channel, "method channel registered");
        self.handlers.insert(channel, handler);
    }

    pub fn channels(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 현재 스레드에서 바로 처리
    pub fn dispatch(&self, channel: &str, call: &MethodCall) -> MethodResponse {
        match self.handlers.get(channel) {
            Some(handler) => handler.handle(call),
            None => Self::missing_channel(channel),
        }
    }

    /// blocking 스레드풀에서 처리
    ///
    /// 키체인 호출은 OS 프롬프트 등으로 블로킹될 수 있어 async 런타임 스레드를 피합니다.
    pub async fn invoke(&self, channel: &str, call: MethodCall) -> MethodResponse {
        let Some(handler) = self.handlers.get(channel).cloned() else {
            return Self::missing_channel(channel);
        };

        let method = call.method.clone();
        match tokio::task::spawn_blocking(move || handler.handle(&call)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(channel, method = %method, error = %e, "method handler failed");
                MethodResponse::Error(CommandError::new(
                    "HANDLER_FAILED",
                    format!("Handler for {}.{} failed: {}", channel, method, e),
                ))
            }
        }
    }

    fn missing_channel(channel: &str) -> MethodResponse {
        tracing::warn!(channel, "no handler registered for channel");
        MethodResponse::Error(CommandError::new(
            "CHANNEL_NOT_FOUND",
            format!("No handler registered for channel {}", channel),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    impl MethodCallHandler for Echo {
        fn handle(&self, call: &MethodCall) -> MethodResponse {
            match call.method.as_str() {
                "echo" => match call.str_arg("text") {
                    Some(text) => MethodResponse::success(text),
                    None => MethodResponse::null(),
                },
                "boom" => panic!("handler exploded"),
                _ => MethodResponse::NotImplemented,
            }
        }
    }

    fn registry() -> ChannelRegistry {
        let mut registry = ChannelRegistry::new();
        registry.register("test.echo", Arc::new(Echo));
        registry
    }

    #[test]
    fn test_str_arg() {
        let call = MethodCall::new("echo", json!({ "text": "hi", "n": 1 }));
        assert_eq!(call.str_arg("text"), Some("hi"));
        assert_eq!(call.str_arg("n"), None);
        assert_eq!(call.str_arg("missing"), None);

        let call = MethodCall::new("echo", json!(["text"]));
        assert_eq!(call.str_arg("text"), None);
    }

    #[test]
    fn test_call_deserializes_without_arguments() {
        let call: MethodCall = serde_json::from_value(json!({ "method": "echo" })).unwrap();
        assert_eq!(call.arguments, Value::Null);
    }

    #[test]
    fn test_dispatch() {
        let registry = registry();
        assert_eq!(
            registry.dispatch("test.echo", &MethodCall::new("echo", json!({ "text": "hi" }))),
            MethodResponse::success("hi")
        );
        assert!(registry
            .dispatch("test.echo", &MethodCall::new("nope", Value::Null))
            .is_not_implemented());
        assert!(matches!(
            registry.dispatch("other", &MethodCall::new("echo", Value::Null)),
            MethodResponse::Error(CommandError { ref code, .. }) if code == "CHANNEL_NOT_FOUND"
        ));
    }

    #[test]
    fn test_response_serialization() {
        assert_eq!(
            serde_json::to_value(MethodResponse::success(true)).unwrap(),
            json!({ "status": "success", "payload": true })
        );
        assert_eq!(
            serde_json::to_value(MethodResponse::NotImplemented).unwrap(),
            json!({ "status": "notImplemented" })
        );
    }

    #[tokio::test]
    async fn test_invoke_survives_panicking_handler() {
        let registry = registry();
        let response = registry
            .invoke("test.echo", MethodCall::new("boom", Value::Null))
            .await;
        assert!(matches!(
            response,
            MethodResponse::Error(CommandError { ref code, .. }) if code == "HANDLER_FAILED"
        ));

        let response = registry
            .invoke("test.echo", MethodCall::new("echo", json!({ "text": "ok" })))
            .await;
        assert_eq!(response, MethodResponse::success("ok"));
    }

    #[test]
    fn test_into_command_result() {
        assert_eq!(
            MethodResponse::success(true).into_command_result("test.echo", "echo"),
            Ok(Value::Bool(true))
        );
        let err = MethodResponse::NotImplemented
            .into_command_result("test.echo", "nope")
            .unwrap_err();
        assert_eq!(err.code, "NOT_IMPLEMENTED");
        assert_eq!(err.message, "Method nope is not implemented on channel test.echo");
    }

    #[test]
    fn test_channels_sorted() {
        let mut registry = registry();
        registry.register("a.first", Arc::new(Echo));
        assert_eq!(registry.channels(), vec!["a.first", "test.echo"]);
    }
}
