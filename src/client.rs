use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use secrecy::SecretString;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{ClientConfig, UnknownProviderPolicy};
use crate::error::LLMError;
use crate::http::reqwest::default_dyn_transport;
use crate::http::{
    DynHttpTransport, collect_body_text, post_json_stream_with_headers, post_json_with_headers,
};
use crate::provider::{StreamItem, WireProtocol, build_headers, http_error};
use crate::registry::{ProviderDescriptor, ProviderRegistry};
use crate::stream::LineDecoder;
use crate::types::{Completion, CompletionRequest, CompletionResult, ConversationMessage};

const PROBE_PROMPT: &str = "Hello";

/// 流式回调 每个非空文本片段调用一次
pub type ChunkCallback<'a> = &'a mut (dyn FnMut(&str) + Send);

/// 多厂商聊天补全入口
///
/// 持有不可变的 registry 与配置 以及共享的 HTTP transport 可以在任务间共享
/// 凭证只在单次调用内存在 不会被保存或写入日志
pub struct ChatClient {
    transport: DynHttpTransport,
    registry: ProviderRegistry,
    config: ClientConfig,
}

/// 单次调用所需的全部数据 凭证已写入 headers
struct PreparedCall {
    provider: &'static str,
    protocol: &'static dyn WireProtocol,
    model: String,
    endpoint: String,
    headers: HashMap<String, String>,
    body: Value,
}

impl ChatClient {
    /// 使用内置 registry 与默认配置创建客户端
    pub fn new(transport: DynHttpTransport) -> Self {
        Self {
            transport,
            registry: ProviderRegistry::builtin().clone(),
            config: ClientConfig::default(),
        }
    }

    /// 创建 Builder 便于自定义配置 registry 与 transport
    pub fn builder() -> ChatClientBuilder {
        ChatClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 列出可选的 provider
    pub fn providers(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.registry.iter()
    }

    /// 按 id 或别名查询 provider 不应用未知 provider 策略
    pub fn descriptor(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.registry.get(id)
    }

    /// 用一次极小的非流式请求检测凭证是否可用
    ///
    /// 只有 2xx 返回 `true` 未知 provider 网络错误与非 2xx 均返回 `false` 不解析响应体
    pub async fn test_connection(&self, provider: &str, api_key: &str) -> bool {
        if api_key.trim().is_empty() {
            debug!(provider, "skipping connection test without an api key");
            return false;
        }
        let messages = [ConversationMessage::user(PROBE_PROMPT)];
        let call = match self.prepare(
            provider,
            api_key,
            &messages,
            false,
            Some(self.config.probe_max_tokens),
        ) {
            Ok(call) => call,
            Err(err) => {
                debug!(provider, error = %err, "connection test could not be prepared");
                return false;
            }
        };
        match post_json_with_headers(
            self.transport.as_ref(),
            call.endpoint,
            call.headers,
            &call.body,
        )
        .await
        {
            Ok(response) => {
                debug!(provider = call.provider, status = response.status, "connection test finished");
                response.is_success()
            }
            Err(err) => {
                debug!(provider = call.provider, error = %err, "connection test failed");
                false
            }
        }
    }

    /// 发送一次聊天补全
    ///
    /// 传入 `on_chunk` 时走流式接口 每个文本片段按到达顺序回调 返回值为所有片段的拼接
    /// 否则发送普通请求并从响应体中提取文本
    ///
    /// # Errors
    ///
    /// 未知 provider 返回 [`LLMError::UnknownProvider`] (`Reject` 策略下)
    /// 网络失败返回 [`LLMError::Transport`] 非 2xx 返回 [`LLMError::Http`]
    /// 响应体格式不符返回 [`LLMError::Parse`]
    pub async fn send_message(
        &self,
        provider: &str,
        api_key: &str,
        messages: &[ConversationMessage],
        on_chunk: Option<ChunkCallback<'_>>,
    ) -> CompletionResult {
        self.complete(provider, api_key, messages, on_chunk, None)
            .await
    }

    /// 与 [`ChatClient::send_message`] 相同 但可由调用方取消
    ///
    /// 取消后不再触发回调 响应体被丢弃 返回 [`LLMError::Aborted`]
    pub async fn send_message_with_cancel(
        &self,
        provider: &str,
        api_key: &str,
        messages: &[ConversationMessage],
        on_chunk: Option<ChunkCallback<'_>>,
        cancel: &CancellationToken,
    ) -> CompletionResult {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(provider, "chat completion cancelled");
                Err(aborted())
            }
            result = self.complete(provider, api_key, messages, on_chunk, Some(cancel)) => result,
        }
    }

    /// 发起流式请求 返回按到达顺序产出文本片段的 Stream
    ///
    /// 非 2xx 状态在返回 Stream 之前就会报错 丢弃 Stream 即可中止读取
    pub async fn stream_message(
        &self,
        provider: &str,
        api_key: &str,
        messages: &[ConversationMessage],
    ) -> Result<TextStream, LLMError> {
        let call = self.prepare(provider, api_key, messages, true, None)?;
        let response = post_json_stream_with_headers(
            self.transport.as_ref(),
            call.endpoint,
            call.headers,
            &call.body,
        )
        .await?;
        if !response.is_success() {
            // 读取错误体失败时仍以状态码报错
            let text = collect_body_text(response.body)
                .await
                .unwrap_or_default();
            warn!(provider = call.provider, status = response.status, "streaming request rejected");
            return Err(http_error(response.status, &response.headers, &text));
        }
        Ok(TextStream {
            lines: LineDecoder::new(response.body, call.protocol.framing()),
            protocol: call.protocol,
            provider: call.provider,
            model: call.model,
            finished: false,
        })
    }

    async fn complete(
        &self,
        provider: &str,
        api_key: &str,
        messages: &[ConversationMessage],
        on_chunk: Option<ChunkCallback<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> CompletionResult {
        let Some(on_chunk) = on_chunk else {
            return self.complete_buffered(provider, api_key, messages).await;
        };

        let mut stream = self.stream_message(provider, api_key, messages).await?;
        let mut content = String::new();
        while let Some(chunk) = stream.next().await {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(aborted());
            }
            let chunk = chunk?;
            on_chunk(&chunk);
            content.push_str(&chunk);
        }
        debug!(provider = stream.provider, bytes = content.len(), "streamed completion finished");
        Ok(Completion {
            content,
            provider: stream.provider.to_string(),
            model: stream.model,
        })
    }

    async fn complete_buffered(
        &self,
        provider: &str,
        api_key: &str,
        messages: &[ConversationMessage],
    ) -> CompletionResult {
        let call = self.prepare(provider, api_key, messages, false, None)?;
        let response = post_json_with_headers(
            self.transport.as_ref(),
            call.endpoint,
            call.headers,
            &call.body,
        )
        .await?;
        let text = response.text();
        if !response.is_success() {
            warn!(provider = call.provider, status = response.status, "request rejected");
            return Err(http_error(response.status, &response.headers, &text));
        }
        let content = call.protocol.parse_response(call.provider, &text)?;
        Ok(Completion {
            content,
            provider: call.provider.to_string(),
            model: call.model,
        })
    }

    fn resolve_provider(&self, id: &str) -> Result<&ProviderDescriptor, LLMError> {
        if let Some(provider) = self.registry.get(id) {
            return Ok(provider);
        }
        match self.config.unknown_provider {
            UnknownProviderPolicy::Reject => Err(LLMError::UnknownProvider { id: id.to_string() }),
            UnknownProviderPolicy::Fallback => {
                let fallback = &self.config.fallback_provider;
                warn!(requested = id, fallback = %fallback, "unknown provider, using fallback");
                self.registry
                    .get(fallback)
                    .ok_or_else(|| LLMError::UnknownProvider {
                        id: fallback.clone(),
                    })
            }
        }
    }

    fn prepare(
        &self,
        provider: &str,
        api_key: &str,
        messages: &[ConversationMessage],
        stream: bool,
        max_tokens: Option<u32>,
    ) -> Result<PreparedCall, LLMError> {
        let provider = self.resolve_provider(provider)?;
        let protocol = provider.wire_format.protocol();
        let request = CompletionRequest {
            provider,
            api_key: SecretString::from(api_key.to_string()),
            model: self.config.model_for(provider),
            messages,
            stream,
            max_tokens,
        };
        let body = protocol.build_body(&request, self.config.anthropic_max_tokens)?;
        let headers = build_headers(protocol, &request);
        let endpoint = self.config.endpoint_for(provider);
        debug!(
            provider = provider.id,
            protocol = protocol.name(),
            model = %request.model,
            endpoint = %endpoint,
            stream,
            messages = messages.len(),
            "sending chat completion request"
        );
        Ok(PreparedCall {
            provider: provider.id,
            protocol,
            model: request.model,
            endpoint,
            headers,
            body,
        })
    }
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("providers", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn aborted() -> LLMError {
    LLMError::Aborted {
        message: "cancelled by caller".to_string(),
    }
}

/// 构建 [`ChatClient`] 的 Builder
#[derive(Default)]
pub struct ChatClientBuilder {
    transport: Option<DynHttpTransport>,
    registry: Option<ProviderRegistry>,
    config: ClientConfig,
}

impl ChatClientBuilder {
    /// 指定 transport 未设置时使用默认的 reqwest 实现
    pub fn transport(mut self, transport: DynHttpTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 替换内置 provider 表
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// 校验配置并构建客户端
    ///
    /// # Errors
    ///
    /// 配置与 registry 不一致时返回 [`LLMError::InvalidConfig`]
    /// 默认 transport 创建失败时返回 [`LLMError::Transport`]
    pub fn build(self) -> Result<ChatClient, LLMError> {
        let registry = self
            .registry
            .unwrap_or_else(|| ProviderRegistry::builtin().clone());
        self.config.validate(&registry)?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_dyn_transport()?,
        };
        Ok(ChatClient {
            transport,
            registry,
            config: self.config,
        })
    }
}

/// [`ChatClient::stream_message`] 返回的文本片段流
///
/// 读到结束标记或连接关闭时结束 传输错误产出一次 `Err` 后结束
pub struct TextStream {
    lines: LineDecoder,
    protocol: &'static dyn WireProtocol,
    provider: &'static str,
    model: String,
    finished: bool,
}

impl TextStream {
    /// 实际使用的 provider id (已解析别名或回退)
    pub fn provider(&self) -> &str {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Stream for TextStream {
    type Item = Result<String, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut this.lines).poll_next(cx) {
                Poll::Ready(Some(Ok(line))) => match this.protocol.decode_stream_line(&line) {
                    StreamItem::Text(text) => return Poll::Ready(Some(Ok(text))),
                    StreamItem::Done => {
                        this.finished = true;
                        return Poll::Ready(None);
                    }
                    StreamItem::Skip => continue,
                },
                Poll::Ready(Some(Err(err))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures_util::stream;

    use super::*;
    use crate::http::{HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport};

    /// 返回固定响应并记录请求的 transport
    struct FixedTransport {
        status: u16,
        body: &'static str,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl FixedTransport {
        fn new(status: u16, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_url(&self) -> String {
            self.requests.lock().unwrap().last().unwrap().url.clone()
        }
    }

    #[async_trait]
    impl HttpTransport for FixedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpResponse {
                status: self.status,
                headers: HashMap::new(),
                body: self.body.as_bytes().to_vec(),
            })
        }

        async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpStreamResponse {
                status: self.status,
                headers: HashMap::new(),
                body: Box::pin(stream::iter(vec![Ok(self.body.as_bytes().to_vec())])),
            })
        }
    }

    const OPENAI_OK: &str = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;

    #[tokio::test]
    async fn unknown_provider_is_rejected_by_default() {
        let transport = FixedTransport::new(200, OPENAI_OK);
        let client = ChatClient::new(transport.clone());
        let err = client
            .send_message("mistral", "key", &[ConversationMessage::user("x")], None)
            .await
            .expect_err("unknown provider");
        assert!(matches!(err, LLMError::UnknownProvider { ref id } if id == "mistral"));
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fallback_policy_routes_to_openrouter() {
        let transport = FixedTransport::new(200, OPENAI_OK);
        let client = ChatClient::builder()
            .transport(transport.clone())
            .config(ClientConfig::default().with_unknown_provider(UnknownProviderPolicy::Fallback))
            .build()
            .expect("client");
        let completion = client
            .send_message("mistral", "key", &[ConversationMessage::user("x")], None)
            .await
            .expect("completion");
        assert_eq!(completion.provider, "openrouter");
        assert_eq!(completion.content, "hi");
        assert_eq!(
            transport.last_url(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn builder_rejects_fallback_outside_registry() {
        let config = ClientConfig {
            fallback_provider: "mistral".to_string(),
            ..ClientConfig::default()
        };
        let err = ChatClient::builder()
            .transport(FixedTransport::new(200, OPENAI_OK))
            .config(config)
            .build()
            .expect_err("invalid config");
        assert!(matches!(err, LLMError::InvalidConfig { ref field, .. } if field == "fallback_provider"));
    }

    #[tokio::test]
    async fn text_stream_stops_at_done_marker() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\
                    data: [DONE]\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n";
        let client = ChatClient::new(FixedTransport::new(200, body));
        let stream = client
            .stream_message("openai", "key", &[ConversationMessage::user("x")])
            .await
            .expect("stream");
        assert_eq!(stream.provider(), "openai");
        assert_eq!(stream.model(), "gpt-4o-mini");
        let chunks: Vec<String> = stream.map(|chunk| chunk.expect("chunk")).collect().await;
        assert_eq!(chunks, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn blank_key_fails_connection_test_without_a_request() {
        let transport = FixedTransport::new(200, OPENAI_OK);
        let client = ChatClient::new(transport.clone());
        assert!(!client.test_connection("openai", "   ").await);
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn descriptor_lookup_ignores_fallback_policy() {
        let client = ChatClient::builder()
            .transport(FixedTransport::new(200, OPENAI_OK))
            .config(ClientConfig::default().with_unknown_provider(UnknownProviderPolicy::Fallback))
            .build()
            .expect("client");
        assert!(client.descriptor("mistral").is_none());
        assert_eq!(client.descriptor("Claude").map(|p| p.id), Some("anthropic"));
        assert_eq!(client.providers().count(), 8);
    }
}
