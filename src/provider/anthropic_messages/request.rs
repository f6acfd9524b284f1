use crate::types::{CompletionRequest, Role};

use super::types::AnthropicMessagesBody;

/// 构建 Anthropic Messages 请求体
///
/// system 消息折叠为顶层 `system` 多条时以空行连接 其余消息按原顺序进入 `messages`
pub(crate) fn build_anthropic_body<'a>(
    request: &'a CompletionRequest<'a>,
    default_max_tokens: u32,
) -> AnthropicMessagesBody<'a> {
    let (system, messages): (Vec<_>, Vec<_>) = request
        .messages
        .iter()
        .partition(|message| message.role == Role::System);

    let system = if system.is_empty() {
        None
    } else {
        Some(
            system
                .iter()
                .map(|message| message.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        )
    };

    AnthropicMessagesBody {
        model: &request.model,
        max_tokens: request.max_tokens.unwrap_or(default_max_tokens),
        messages,
        system,
        stream: request.stream,
    }
}
