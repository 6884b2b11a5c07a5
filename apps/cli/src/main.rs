//! # Strider CLI
//!
//! RL 运动控制器的命令行宿主。
//!
//! ```bash
//! # 校验配置与策略文件
//! strider-cli check --config configs/biped.toml
//!
//! # 生成全零线性策略（联调用）
//! strider-cli init-policy --config configs/biped.toml --output configs/biped_policy.json
//!
//! # 站立 2 秒后以 0.3 m/s 行走 5 秒（合成传感器回环）
//! strider-cli run --config configs/biped.toml --sim --stand-secs 2 --walk-secs 5 --vx 0.3
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod plant;

use commands::{CheckCommand, InitPolicyCommand, RunCommand};

/// 默认日志过滤规则（可用 RUST_LOG 覆盖）
const DEFAULT_LOG_FILTER: &str = "strider_cli=info,strider_control=info";

/// Strider CLI - RL 运动控制器宿主
#[derive(Parser, Debug)]
#[command(name = "strider-cli")]
#[command(about = "Command-line host for the Strider RL locomotion controller", long_about = None)]
#[command(version)]
struct Cli {
    /// 以 JSON 格式输出日志
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 校验控制配置并加载策略
    Check {
        #[command(flatten)]
        args: CheckCommand,
    },

    /// 按配置维度生成线性策略文件
    InitPolicy {
        #[command(flatten)]
        args: InitPolicyCommand,
    },

    /// 运行控制循环
    Run {
        #[command(flatten)]
        args: RunCommand,
    },
}

fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match cli.command {
        Commands::Check { args } => args.execute(),
        Commands::InitPolicy { args } => args.execute(),
        Commands::Run { args } => args.execute(),
    }
}
