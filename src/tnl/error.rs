//! TNL 错误类型
//!
//! 只有加载规则集会失败；规范化内部的异常都降级为诊断。

use std::path::PathBuf;

use thiserror::Error;

/// 规则集加载/校验错误
#[derive(Debug, Error)]
pub enum RuleSetError {
    #[error("读取规则文件失败 {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析{context}失败: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("规则 {rule} 的正则无效: {source}")]
    InvalidRegex {
        rule: String,
        #[source]
        source: regex::Error,
    },
    #[error("规则 ID 重复: {0}")]
    DuplicateRule(String),
    #[error("规则 {0} 的模式可能不消耗任何 token")]
    EmptyPattern(String),
    #[error("规则集版本不能为空")]
    MissingVersion,
}

impl RuleSetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn regex(rule: &str, source: regex::Error) -> Self {
        Self::InvalidRegex {
            rule: rule.to_string(),
            source,
        }
    }
}

/// 单个匹配改写失败（调用方原样保留并记录诊断）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("数字片段无法解析: {0}")]
    MalformedNumeral(String),
    #[error("匹配中缺少所需的 token: {0}")]
    MissingToken(&'static str),
}

/// 语料扫描时单条发言的失败（计入跳过数）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("无法读取发言 {source_name}: {message}")]
    Unreadable { source_name: String, message: String },
    #[error("发言过长 ({len} 字节，上限 {limit})")]
    TooLong { len: usize, limit: usize },
}
