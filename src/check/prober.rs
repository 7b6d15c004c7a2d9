//! HTTP域名探测器实现
//!
//! 对单个域名执行一次有界HTTP请求，并对失败原因进行分类

use crate::check::outcome::{ProbeErrorKind, ProbeOutcome};
use crate::config::DomainTarget;
use crate::error::{CheckError, Result};
use async_trait::async_trait;
use reqwest::{redirect, Client};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// 域名探测器trait，定义探测接口
///
/// 探测永远不向调用方抛出错误：任何失败都转换为一个不成功的
/// `ProbeOutcome`，保证单个域名的问题不会中断整轮检查
#[async_trait]
pub trait Prober: Send + Sync {
    /// 执行单次探测（不重试）
    ///
    /// # 参数
    /// * `target` - 监控目标
    /// * `timeout_duration` - 超时时间
    ///
    /// # 返回
    /// * `ProbeOutcome` - 探测结果
    async fn probe(&self, target: &DomainTarget, timeout_duration: Duration) -> ProbeOutcome;
}

/// HTTP域名探测器实现
pub struct HttpProber {
    /// HTTP客户端（连接池复用）
    client: Client,
}

impl HttpProber {
    /// 创建新的HTTP探测器
    ///
    /// 不跟随重定向：3xx状态码直接参与期望状态码匹配
    ///
    /// # 参数
    /// * `timeout` - 客户端级超时时间
    ///
    /// # 返回
    /// * `Result<Self>` - 探测器实例
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .redirect(redirect::Policy::none())
            .build()
            .map_err(CheckError::ClientError)?;

        Ok(Self { client })
    }

    /// 收集错误链上的全部描述文本，用于错误分类
    fn error_chain_string(error: &reqwest::Error) -> String {
        let mut parts = vec![error.to_string()];
        let mut source = std::error::Error::source(error);
        while let Some(err) = source {
            parts.push(err.to_string());
            source = err.source();
        }
        parts.join(": ")
    }

    /// 对请求错误进行分类
    ///
    /// # 参数
    /// * `error` - reqwest错误
    ///
    /// # 返回
    /// * `(ProbeErrorKind, String)` - 错误分类与详情
    fn classify_request_error(error: &reqwest::Error) -> (ProbeErrorKind, String) {
        let chain = Self::error_chain_string(error);
        let lower = chain.to_lowercase();

        if error.is_timeout() {
            return (ProbeErrorKind::Timeout, "请求超时".to_string());
        }

        // DNS失败在reqwest中表现为连接错误，按错误链文本识别
        let dns_hints = [
            "dns error",
            "failed to lookup",
            "name or service not known",
            "no such host",
            "nodename nor servname",
            "temporary failure in name resolution",
            "nxdomain",
        ];
        if dns_hints.iter().any(|hint| lower.contains(hint)) {
            return (ProbeErrorKind::Dns, chain);
        }

        let tls_hints = ["certificate", "tls", "ssl", "handshake"];
        if tls_hints.iter().any(|hint| lower.contains(hint)) {
            return (ProbeErrorKind::Tls, chain);
        }

        if error.is_connect() {
            return (ProbeErrorKind::Connect, chain);
        }

        (ProbeErrorKind::Unknown, chain)
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &DomainTarget, timeout_duration: Duration) -> ProbeOutcome {
        let start_time = Instant::now();

        let request = self.client.get(&target.url);
        let response_result = timeout(timeout_duration, request.send()).await;
        let latency = start_time.elapsed();

        match response_result {
            Ok(Ok(response)) => {
                let status_code = response.status().as_u16();

                if target.is_expected_status(status_code) {
                    debug!(
                        "域名 {} 检查成功，状态码：{}",
                        target.display_name, status_code
                    );
                    ProbeOutcome::success(
                        target.id.clone(),
                        target.url.clone(),
                        status_code,
                        latency,
                    )
                } else {
                    warn!(
                        "域名 {} 状态码异常：{}",
                        target.display_name, status_code
                    );
                    ProbeOutcome::failure(
                        target.id.clone(),
                        target.url.clone(),
                        ProbeErrorKind::UnexpectedStatus,
                        format!("状态码：{status_code}"),
                        latency,
                    )
                    .with_status_code(status_code)
                }
            }
            Ok(Err(error)) => {
                let (kind, message) = Self::classify_request_error(&error);
                warn!("域名 {} 检查失败：{}", target.display_name, message);
                ProbeOutcome::failure(target.id.clone(), target.url.clone(), kind, message, latency)
            }
            Err(_) => {
                warn!(
                    "域名 {} 请求超时（{}秒）",
                    target.display_name,
                    timeout_duration.as_secs()
                );
                ProbeOutcome::failure(
                    target.id.clone(),
                    target.url.clone(),
                    ProbeErrorKind::Timeout,
                    format!("请求超时（{}秒）", timeout_duration.as_secs()),
                    latency,
                )
            }
        }
    }
}
