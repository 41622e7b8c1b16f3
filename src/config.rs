// src/config.rs

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::tnl::{ArtifactReporter, ExceptionTable, ReporterOptions, RuleSet, TnlEngine};

// ============================================================================
// 规范化配置
// ============================================================================

/// 规范化配置
///
/// 所有字段都有默认值，配置文件缺失或字段缺失时使用默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// 外部规则集（替换内置规则集）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<PathBuf>,
    /// 外部例外表（叠加在规则集自带的例外表之上）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exceptions_path: Option<PathBuf>,
    /// 报告中每个类别保留的样本数
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
    /// 样本上下文左右各保留的字符数
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
    /// 报告扫描线程数（0 = 可用并行度）
    #[serde(default)]
    pub workers: usize,
    /// 超过该字节数的发言在扫描时跳过
    #[serde(default = "default_max_utterance_bytes")]
    pub max_utterance_bytes: usize,
    /// 未分类片段写入 trace 日志
    #[serde(default)]
    pub log_unclassified: bool,
}

fn default_sample_limit() -> usize {
    20
}

fn default_context_chars() -> usize {
    40
}

fn default_max_utterance_bytes() -> usize {
    64 * 1024
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            exceptions_path: None,
            sample_limit: default_sample_limit(),
            context_chars: default_context_chars(),
            workers: 0,
            max_utterance_bytes: default_max_utterance_bytes(),
            log_unclassified: false,
        }
    }
}

impl NormalizerConfig {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法获取配置目录"))?;
        let app_dir = config_dir.join("OyezAsr");
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join("normalizer.json"))
    }

    /// 从默认位置加载，文件不存在时返回默认配置
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            tracing::warn!("配置文件不存在，使用默认配置: {:?}", path);
            Ok(Self::default())
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        tracing::info!("尝试从以下路径加载配置: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let config: NormalizerConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("解析配置文件 {:?} 失败: {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_utterance_bytes == 0 {
            anyhow::bail!("max_utterance_bytes 必须大于 0");
        }
        if let Some(path) = &self.rules_path {
            if !path.exists() {
                anyhow::bail!("规则文件不存在: {:?}", path);
            }
        }
        if let Some(path) = &self.exceptions_path {
            if !path.exists() {
                anyhow::bail!("例外表文件不存在: {:?}", path);
            }
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_path()?)
    }

    /// 原子写入：先写临时文件，旧文件备份后再替换
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tracing::info!("保存配置到: {:?}", path);

        let temp_path = path.with_extension("json.tmp");
        let backup_path = path.with_extension("json.bak");

        std::fs::write(&temp_path, &content).map_err(|e| {
            tracing::error!("写入临时文件失败: {}", e);
            e
        })?;

        if path.exists() {
            if backup_path.exists() {
                let _ = std::fs::remove_file(&backup_path);
            }
            std::fs::rename(path, &backup_path).map_err(|e| {
                tracing::error!("备份旧配置文件失败: {}", e);
                e
            })?;
        }

        match std::fs::rename(&temp_path, path) {
            Ok(_) => {
                let _ = std::fs::remove_file(&backup_path);
                tracing::info!("配置保存成功");
                Ok(())
            }
            Err(e) => {
                tracing::error!("重命名临时文件失败: {}", e);
                if backup_path.exists() {
                    if let Err(restore_err) = std::fs::rename(&backup_path, path) {
                        tracing::error!("恢复备份失败: {}", restore_err);
                    } else {
                        tracing::info!("已从备份恢复配置");
                    }
                }
                Err(e.into())
            }
        }
    }

    /// 加载规则集：外部规则文件或内置规则集，再叠加外部例外表
    pub fn build_rule_set(&self) -> Result<Arc<RuleSet>> {
        let mut rules = match &self.rules_path {
            Some(path) => RuleSet::load(path)?,
            None => RuleSet::builtin()?,
        };
        if let Some(path) = &self.exceptions_path {
            rules = rules.with_exceptions(ExceptionTable::load(path)?);
        }
        Ok(Arc::new(rules))
    }

    pub fn build_engine(&self) -> Result<TnlEngine> {
        Ok(TnlEngine::new(self.build_rule_set()?).with_unclassified_logging(self.log_unclassified))
    }

    pub fn reporter_options(&self) -> ReporterOptions {
        ReporterOptions {
            sample_limit: self.sample_limit,
            context_chars: self.context_chars,
            workers: self.workers,
            max_utterance_bytes: self.max_utterance_bytes,
        }
    }

    pub fn build_reporter(&self) -> Result<ArtifactReporter> {
        Ok(ArtifactReporter::new(self.build_rule_set()?, self.reporter_options()))
    }
}
