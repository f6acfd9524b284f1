//! 多厂商 LLM 聊天补全客户端
//!
//! 八个厂商 三种线上格式 (OpenAI 兼容 / Anthropic Messages / Cohere Chat v1)
//! 统一为 [`ChatClient::send_message`] 一个调用

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod provider;
pub mod registry;
pub mod stream;
pub mod types;

pub use client::{ChatClient, ChatClientBuilder, ChunkCallback, TextStream};
pub use config::{ClientConfig, UnknownProviderPolicy};
pub use error::LLMError;
pub use provider::{StreamItem, WireProtocol};
pub use registry::{ProviderDescriptor, ProviderRegistry, WireFormat};
pub use tokio_util::sync::CancellationToken;
pub use types::*;
