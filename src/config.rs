use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::LLMError;
use crate::registry::{ProviderDescriptor, ProviderRegistry};

const DEFAULT_FALLBACK_PROVIDER: &str = "openrouter";
const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 4000;
const DEFAULT_PROBE_MAX_TOKENS: u32 = 10;

/// 未知 provider id 的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownProviderPolicy {
    /// 直接返回 [`LLMError::UnknownProvider`]
    #[default]
    Reject,
    /// 兼容旧行为 静默改用 `fallback_provider`
    Fallback,
}

/// 客户端配置 所有字段都有默认值 可以从 JSON 反序列化
///
/// # Examples
///
/// ```
/// use face_llm::config::{ClientConfig, UnknownProviderPolicy};
///
/// let config = ClientConfig::from_json_str(r#"{
///     "unknown_provider": "fallback",
///     "models": { "groq": "llama-3.3-70b-versatile" }
/// }"#).unwrap();
/// assert_eq!(config.unknown_provider, UnknownProviderPolicy::Fallback);
/// assert_eq!(config.fallback_provider, "openrouter");
/// assert_eq!(config.anthropic_max_tokens, 4000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub unknown_provider: UnknownProviderPolicy,
    /// `Fallback` 策略下使用的 provider id
    pub fallback_provider: String,
    /// 按 provider id 覆盖默认模型
    pub models: HashMap<String, String>,
    /// 按 provider id 覆盖完整 endpoint URL 例如代理或本地测试服务
    pub endpoints: HashMap<String, String>,
    /// Anthropic 请求未指定时使用的 max_tokens
    pub anthropic_max_tokens: u32,
    /// test_connection 使用的 token 上限
    pub probe_max_tokens: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            unknown_provider: UnknownProviderPolicy::default(),
            fallback_provider: DEFAULT_FALLBACK_PROVIDER.to_string(),
            models: HashMap::new(),
            endpoints: HashMap::new(),
            anthropic_max_tokens: DEFAULT_ANTHROPIC_MAX_TOKENS,
            probe_max_tokens: DEFAULT_PROBE_MAX_TOKENS,
        }
    }
}

impl ClientConfig {
    /// 从 JSON 文本解析配置 缺省字段取默认值
    pub fn from_json_str(text: &str) -> Result<Self, LLMError> {
        serde_json::from_str(text).map_err(|err| LLMError::InvalidConfig {
            field: "config".to_string(),
            reason: err.to_string(),
        })
    }

    /// 设置某个 provider 的模型
    pub fn with_model(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.models.insert(provider.into(), model.into());
        self
    }

    /// 设置某个 provider 的 endpoint
    pub fn with_endpoint(mut self, provider: impl Into<String>, url: impl Into<String>) -> Self {
        self.endpoints.insert(provider.into(), url.into());
        self
    }

    pub fn with_unknown_provider(mut self, policy: UnknownProviderPolicy) -> Self {
        self.unknown_provider = policy;
        self
    }

    /// 检查配置与 registry 是否一致
    pub fn validate(&self, registry: &ProviderRegistry) -> Result<(), LLMError> {
        if registry.get(&self.fallback_provider).is_none() {
            return Err(LLMError::InvalidConfig {
                field: "fallback_provider".to_string(),
                reason: format!("`{}` is not a registered provider", self.fallback_provider),
            });
        }
        for (field, map) in [("models", &self.models), ("endpoints", &self.endpoints)] {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut seen: HashMap<&str, &str> = HashMap::new();
            for key in keys {
                let Some(provider) = registry.get(key) else {
                    return Err(LLMError::InvalidConfig {
                        field: field.to_string(),
                        reason: format!("`{key}` is not a registered provider"),
                    });
                };
                if let Some(previous) = seen.insert(provider.id, key) {
                    return Err(LLMError::InvalidConfig {
                        field: field.to_string(),
                        reason: format!(
                            "`{previous}` and `{key}` both refer to provider `{}`",
                            provider.id
                        ),
                    });
                }
            }
        }
        if self.anthropic_max_tokens == 0 {
            return Err(LLMError::InvalidConfig {
                field: "anthropic_max_tokens".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn model_for(&self, provider: &ProviderDescriptor) -> String {
        lookup(&self.models, provider)
            .unwrap_or(provider.default_model)
            .to_string()
    }

    pub(crate) fn endpoint_for(&self, provider: &ProviderDescriptor) -> String {
        lookup(&self.endpoints, provider)
            .unwrap_or(provider.endpoint_url)
            .to_string()
    }
}

/// 覆盖表的 key 可以是 id 或别名 大小写不敏感
///
/// id 优先于别名 多个别名同时命中时取字典序最小的 key 保证结果与哈希顺序无关
fn lookup<'a>(map: &'a HashMap<String, String>, provider: &ProviderDescriptor) -> Option<&'a str> {
    map.iter()
        .filter(|(key, _)| provider.answers_to(key))
        .min_by_key(|&(key, _)| (!key.trim().eq_ignore_ascii_case(provider.id), key.as_str()))
        .map(|(_, value)| value.as_str())
}
