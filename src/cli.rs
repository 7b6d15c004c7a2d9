//! 命令行参数定义
//!
//! 基于clap的CLI参数与子命令解析

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// 批量域名可用性监控工具
#[derive(Debug, Parser)]
#[command(name = crate::APP_NAME, version = crate::VERSION, about = crate::APP_DESCRIPTION)]
pub struct Cli {
    /// 配置文件路径
    #[arg(short, long, env = "DOMAIN_VITALS_CONFIG")]
    pub config: Option<PathBuf>,

    /// 覆盖配置中的日志级别
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// 启动周期监控服务
    Run {
        /// 禁用通知发送（只记录日志）
        #[arg(long)]
        no_notify: bool,
    },
    /// 执行单轮检查后退出
    Check {
        /// 禁用通知发送（只记录日志）
        #[arg(long)]
        no_notify: bool,
    },
    /// 验证配置文件并退出
    ValidateConfig,
}

impl Cli {
    /// 解析配置文件路径
    ///
    /// 优先级：命令行参数 > 用户配置目录 > 当前目录
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.config {
            return path.clone();
        }

        if let Some(config_dir) = dirs::config_dir() {
            let candidate = config_dir.join("domain-vitals").join("config.toml");
            if candidate.exists() {
                return candidate;
            }
        }

        PathBuf::from("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_path_wins() {
        let cli = Cli::parse_from([
            "domain-vitals",
            "--config",
            "/tmp/custom.toml",
            "validate-config",
        ]);
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/custom.toml"));
    }

    #[test]
    fn test_subcommand_parsing() {
        let cli = Cli::parse_from(["domain-vitals", "check", "--no-notify"]);
        assert!(matches!(
            cli.command,
            Commands::Check { no_notify: true }
        ));

        let cli = Cli::parse_from(["domain-vitals", "run"]);
        assert!(matches!(cli.command, Commands::Run { no_notify: false }));
    }
}
