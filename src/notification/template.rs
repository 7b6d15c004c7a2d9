//! 消息模板模块
//!
//! 使用Handlebars将通知载荷渲染为Markdown文本

use crate::check::ProbeErrorKind;
use crate::notification::payload::{
    NotificationPayload, PayloadKind, ReportEvent,
};
use crate::error::NotificationError;
use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// 智能差分通知模板
const SMART_DIFF_TEMPLATE: &str = r#"🔔 **状态变化通知**{{#if partial}}（本轮未完整执行）{{/if}}

{{#if alert_count}}🆕 **新出现问题 ({{alert_count}}个)**:
{{#each alerts}}• {{this.name}} - {{this.error}}
{{/each}}
{{/if}}{{#if recovery_count}}✅ **已恢复正常 ({{recovery_count}}个)**:
{{#each recoveries}}• {{this.name}}
{{/each}}
{{/if}}📊 **当前总体**: 检查 {{total}} 个，正常 {{healthy}} 个，异常 {{failing}} 个
⏰ {{timestamp}}"#;

/// 全量报告通知模板
const FULL_REPORT_TEMPLATE: &str = r#"{{#if failing}}⚠️ **检查结果 - {{group_name}}**{{else}}✅ **全部正常 - {{group_name}}**{{/if}}{{#if partial}}（本轮未完整执行）{{/if}}

🔍 检查域名: {{total}} 个
✅ 正常在线: {{healthy}} 个
❌ 异常域名: {{failing}} 个

{{#each error_groups}}**{{this.emoji}} {{this.name}} ({{this.count}}个):**
{{#each this.domains}}  • {{this}}
{{/each}}
{{/each}}{{#if recovery_count}}🟢 **已恢复 ({{recovery_count}}个)**:
{{#each recoveries}}  • {{this.name}}
{{/each}}
{{/if}}⏰ {{timestamp}}"#;

/// 错误类型对应的emoji
fn error_emoji(kind: ProbeErrorKind) -> &'static str {
    match kind {
        ProbeErrorKind::Dns => "🔍",
        ProbeErrorKind::Connect => "🔌",
        ProbeErrorKind::Timeout => "⏱️",
        ProbeErrorKind::Tls => "🔒",
        ProbeErrorKind::UnexpectedStatus => "❌",
        ProbeErrorKind::Unknown => "❓",
    }
}

/// 消息渲染器
///
/// 预注册模板，按载荷类型选择模板渲染
pub struct MessageRenderer {
    registry: Handlebars<'static>,
}

impl MessageRenderer {
    /// 创建新的消息渲染器
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry
            .register_template_string("smart_diff", SMART_DIFF_TEMPLATE)
            .context("注册智能差分模板失败")?;
        registry
            .register_template_string("full_report", FULL_REPORT_TEMPLATE)
            .context("注册全量报告模板失败")?;

        Ok(Self { registry })
    }

    /// 渲染通知载荷为Markdown文本
    ///
    /// # 参数
    /// * `payload` - 通知载荷
    /// * `group_name` - 群组显示名称
    ///
    /// # 返回
    /// * `Result<String>` - 渲染后的消息
    pub fn render_payload(
        &self,
        payload: &NotificationPayload,
        group_name: &str,
    ) -> Result<String> {
        let data = Self::build_context(payload, group_name);
        let template = match payload.kind {
            PayloadKind::SmartDiff => "smart_diff",
            PayloadKind::Full => "full_report",
        };

        self.registry
            .render(template, &data)
            .map_err(|e| NotificationError::TemplateError(e.to_string()).into())
    }

    /// 构建模板上下文
    fn build_context(payload: &NotificationPayload, group_name: &str) -> Value {
        let alerts: Vec<Value> = payload
            .events(ReportEvent::Alert)
            .map(|r| {
                json!({
                    "name": r.display_name,
                    "url": r.url,
                    "error": r.error_kind.map(|k| k.description()).unwrap_or("未知错误"),
                    "status_code": r.status_code,
                    "failures": r.consecutive_failures,
                })
            })
            .collect();

        let recoveries: Vec<Value> = payload
            .events(ReportEvent::Recovery)
            .map(|r| {
                json!({
                    "name": r.display_name,
                    "url": r.url,
                    "latency_ms": r.latency_ms,
                })
            })
            .collect();

        // 全量模式下按错误类型聚合全部异常条目（含本轮告警条目）
        let mut by_kind: BTreeMap<u8, (ProbeErrorKind, Vec<String>)> = BTreeMap::new();
        for report in payload
            .domains
            .iter()
            .filter(|r| r.event != ReportEvent::Recovery)
        {
            let kind = report.error_kind.unwrap_or(ProbeErrorKind::Unknown);
            by_kind
                .entry(kind as u8)
                .or_insert_with(|| (kind, Vec::new()))
                .1
                .push(report.display_name.clone());
        }

        let error_groups: Vec<Value> = by_kind
            .into_values()
            .map(|(kind, domains)| {
                json!({
                    "emoji": error_emoji(kind),
                    "name": kind.description(),
                    "count": domains.len(),
                    "domains": domains,
                })
            })
            .collect();

        json!({
            "group_name": group_name,
            "round_id": payload.round_id,
            "partial": payload.partial,
            "total": payload.summary.total,
            "healthy": payload.summary.healthy,
            "failing": payload.summary.failing,
            "alert_count": alerts.len(),
            "recovery_count": recoveries.len(),
            "alerts": alerts,
            "recoveries": recoveries,
            "error_groups": error_groups,
            "timestamp": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        })
    }
}
