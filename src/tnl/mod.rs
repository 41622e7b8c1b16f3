//! TNL (Transcript Normalization Layer) - 庭审转录规范化层
//!
//! 把庭审转录的书面形式改写成与音频一致的口语形式，作为 ASR 训练目标。
//!
//! ## 处理流程
//! 1. 分词（单词/数字/括注/符号/标点，保留原文偏移）
//! 2. 模式目录穷举候选匹配
//! 3. 上下文判定 + 优先级消歧（左到右、不重叠）
//! 4. 按类别改写（读数、拼读、查表、删除、保留）
//! 5. 片段编辑器拼出规范化文本并记录对齐
//!
//! 报告器用同一套分类对整个语料做统计，不改写文本。

pub mod catalog;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod numbers;
pub mod reporter;
pub mod rewrite;
pub mod rules;
pub mod span_editor;
pub mod tokenizer;
pub mod types;

pub use engine::TnlEngine;
pub use error::{RewriteError, RuleSetError, ScanError};
pub use reporter::{
    ArtifactReport, ArtifactReporter, CategoryStats, PendingVerification, ReporterOptions, Sample,
    VerificationStatus,
};
pub use rules::{ExceptionTable, RuleFile, RuleSet};
pub use tokenizer::{Token, TokenKind, Tokenizer};
pub use types::{
    AlignmentKind, AlignmentSpan, AppliedMatch, Category, Diagnostic, DiagnosticKind, Match,
    NormalizationResult, Utterance,
};
