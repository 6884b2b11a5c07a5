//! check 命令
//!
//! 加载并校验控制配置，尝试加载策略文件，打印维度摘要。

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use strider_control::{LinearPolicyLoader, PolicyInvoker};
use tracing::info;

/// 配置校验命令参数
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// 控制配置文件（TOML）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 只校验配置，不加载策略
    #[arg(long)]
    pub skip_policy: bool,
}

impl CheckCommand {
    pub fn execute(&self) -> Result<()> {
        let config = super::load_config(&self.config)?;

        let onnx = &config.onnx_conf;
        println!("Config OK: {}", self.config.display());
        println!("  joints:        {}", config.num_joints());
        println!("  control rate:  {} Hz", config.control_rate_hz);
        println!(
            "  policy rate:   {:.1} Hz (decimation {})",
            1.0 / config.policy_dt(),
            config.walk_step_conf.decimation
        );
        println!(
            "  observation:   {} x {} = {}",
            onnx.obs_size,
            onnx.num_hist,
            onnx.input_len()
        );
        println!("  actions:       {}", onnx.actions_size);

        if self.skip_policy {
            return Ok(());
        }

        let invoker = PolicyInvoker::load(&LinearPolicyLoader, onnx)
            .with_context(|| format!("Failed to load policy {}", onnx.policy_file))?;
        info!("Policy check passed: {:?}", invoker);
        println!("Policy OK: {}", onnx.policy_file);
        Ok(())
    }
}
