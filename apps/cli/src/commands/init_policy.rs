//! init-policy 命令
//!
//! 按配置中的观测/动作维度生成线性策略 JSON（权重全零，可选偏置），
//! 用于在没有训练好的模型时联调整条控制链路。

use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::PathBuf;
use strider_control::policy::LinearPolicyFile;

/// 生成线性策略命令参数
#[derive(Args, Debug)]
pub struct InitPolicyCommand {
    /// 控制配置文件（TOML）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 输出路径（默认使用配置中的 policy_file）
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 每个输出的常数偏置
    #[arg(long, default_value_t = 0.0)]
    pub bias: f32,

    /// 覆盖已存在的文件
    #[arg(long)]
    pub force: bool,
}

impl InitPolicyCommand {
    pub fn execute(&self) -> Result<()> {
        let config = super::load_config(&self.config)?;
        let onnx = &config.onnx_conf;

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&onnx.policy_file));
        if output.exists() && !self.force {
            bail!(
                "{} already exists (use --force to overwrite)",
                output.display()
            );
        }

        let file = LinearPolicyFile {
            input_len: onnx.input_len(),
            output_len: onnx.actions_size,
            weights: vec![0.0; onnx.input_len() * onnx.actions_size],
            bias: vec![self.bias; onnx.actions_size],
        };
        let json = serde_json::to_string(&file).context("Failed to serialize policy")?;
        std::fs::write(&output, json)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        println!(
            "Wrote linear policy {} ({} -> {})",
            output.display(),
            file.input_len,
            file.output_len
        );
        Ok(())
    }
}
