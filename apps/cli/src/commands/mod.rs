//! 命令定义和实现

pub mod check;
pub mod init_policy;
pub mod run;

pub use check::CheckCommand;
pub use init_policy::InitPolicyCommand;
pub use run::RunCommand;

use anyhow::{Context, Result};
use std::path::Path;
use strider_protocol::ControlConfig;

/// 加载并校验控制配置
///
/// 相对路径的 `policy_file` 按配置文件所在目录解析。
pub fn load_config(path: &Path) -> Result<ControlConfig> {
    let mut config = ControlConfig::load_validated(path)
        .with_context(|| format!("Invalid control config {}", path.display()))?;

    let policy = Path::new(&config.onnx_conf.policy_file);
    if policy.is_relative()
        && let Some(dir) = path.parent()
    {
        config.onnx_conf.policy_file = dir.join(policy).display().to_string();
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_resolves_policy_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let source = concat!(env!("CARGO_MANIFEST_DIR"), "/../../configs/biped.toml");
        let path = dir.path().join("biped.toml");
        std::fs::copy(source, &path).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            Path::new(&config.onnx_conf.policy_file),
            dir.path().join("biped_policy.json")
        );
        assert_eq!(config.num_joints(), 12);
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Path::new("/nonexistent/strider.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/strider.toml"));
    }
}
