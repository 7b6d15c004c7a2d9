//! Telegram通知分发器模块
//!
//! 通过Telegram Bot API将渲染后的通知投递到各群组对应的聊天

use crate::config::{GroupId, TelegramConfig};
use crate::error::NotificationError;
use crate::notification::dispatcher::NotificationDispatcher;
use crate::notification::payload::NotificationPayload;
use crate::notification::template::MessageRenderer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info};

/// Telegram消息长度上限
const MAX_MESSAGE_LENGTH: usize = 4096;

/// 群组对应的投递目标
#[derive(Debug, Clone)]
struct ChatTarget {
    chat_id: String,
    name: String,
}

/// Telegram通知分发器
pub struct TelegramDispatcher {
    /// HTTP客户端
    client: Client,
    /// Bot API基础URL（含token）
    api_base_url: String,
    /// 群组ID到聊天目标的映射
    chats: HashMap<GroupId, ChatTarget>,
    /// 消息渲染器
    renderer: MessageRenderer,
}

/// 超长消息截断
///
/// 超过Telegram上限时在末尾追加截断提示
fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_LENGTH {
        return message.to_string();
    }

    let truncated: String = message.chars().take(MAX_MESSAGE_LENGTH - 100).collect();
    format!("{truncated}\n\n... [消息已截断，请查看日志获取完整信息]")
}

impl TelegramDispatcher {
    /// 从Telegram配置创建分发器
    ///
    /// # 参数
    /// * `config` - Telegram配置
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        Self::with_api_base(config, "https://api.telegram.org")
    }

    /// 指定API地址创建分发器（测试用）
    pub fn with_api_base(config: &TelegramConfig, api_base: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("创建HTTP客户端失败")?;

        let chats = config
            .groups
            .iter()
            .map(|group| {
                let name = if group.name.is_empty() {
                    group.id.clone()
                } else {
                    group.name.clone()
                };
                (
                    GroupId::new(group.id.clone()),
                    ChatTarget {
                        chat_id: group.chat_id.clone(),
                        name,
                    },
                )
            })
            .collect();

        Ok(Self {
            client,
            api_base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), config.bot_token),
            chats,
            renderer: MessageRenderer::new()?,
        })
    }

    /// 发送消息到指定聊天
    async fn send_message(&self, chat_id: &str, message: &str) -> Result<()> {
        let message = truncate_message(message);

        debug!("发送Telegram消息到聊天 {}", chat_id);

        let response = self
            .client
            .post(format!("{}/sendMessage", self.api_base_url))
            .json(&json!({
                "chat_id": chat_id,
                "text": message,
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            }))
            .send()
            .await
            .context("发送Telegram消息失败")?;

        if response.status().is_success() {
            info!("Telegram消息发送成功");
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!("Telegram消息发送失败: {} - {}", status, text);
            Err(NotificationError::SendError(format!("状态码: {status}")).into())
        }
    }
}

#[async_trait]
impl NotificationDispatcher for TelegramDispatcher {
    async fn dispatch(&self, payload: &NotificationPayload) -> Result<()> {
        let chat = self.chats.get(&payload.group_id).ok_or_else(|| {
            NotificationError::ConfigError(format!(
                "群组 {} 未配置Telegram聊天ID",
                payload.group_id
            ))
        })?;

        let message = self.renderer.render_payload(payload, &chat.name)?;
        self.send_message(&chat.chat_id, &message).await
    }

    async fn test_connection(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/getMe", self.api_base_url))
            .send()
            .await
            .context("无法连接到Telegram API")?;

        if response.status().is_success() {
            info!("Telegram Bot连接正常");
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Telegram Bot Token无效，状态码: {}",
                response.status()
            ))
        }
    }
}
