//! TNL 语料报告
//!
//! 只运行分词 + 分类（不改写），按类别统计匹配次数并保留有界的样本，
//! 供人工核对规则。发言之间没有共享状态，按块并行扫描后合并。

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use crossbeam_channel::bounded;
use serde::{Deserialize, Serialize};

use crate::tnl::classifier;
use crate::tnl::error::ScanError;
use crate::tnl::rules::RuleSet;
use crate::tnl::tokenizer::{TokenKind, Tokenizer};
use crate::tnl::types::{Category, Utterance};

// ============================================================================
// 报告结构
// ============================================================================

/// 样本：某个书面形式第一次出现的位置和上下文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 语料中的发言序号
    pub utterance: usize,
    /// 发言内的字节偏移
    pub offset: usize,
}

impl Sample {
    fn position(&self) -> (usize, usize) {
        (self.utterance, self.offset)
    }
}

/// 单个类别的统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    /// 匹配总次数（精确）
    pub count: u64,
    /// 书面形式 → 样本，只保留字典序最小的若干个
    pub samples: BTreeMap<String, Sample>,
}

impl CategoryStats {
    fn record(&mut self, surface: &str, sample: Sample, limit: usize) {
        self.count += 1;
        self.offer(surface.to_string(), sample, limit);
    }

    /// 加入样本：同一形式保留最早出现的位置，超出上限时丢弃字典序最大的形式
    fn offer(&mut self, surface: String, sample: Sample, limit: usize) {
        if limit == 0 {
            return;
        }
        if let Some(existing) = self.samples.get_mut(&surface) {
            if sample.position() < existing.position() {
                *existing = sample;
            }
            return;
        }
        if self.samples.len() >= limit {
            match self.samples.last_key_value() {
                Some((largest, _)) if surface < *largest => {}
                _ => return,
            }
        }
        self.samples.insert(surface, sample);
        while self.samples.len() > limit {
            self.samples.pop_last();
        }
    }

    fn merge(&mut self, other: CategoryStats, limit: usize) {
        self.count += other.count;
        for (surface, sample) in other.samples {
            self.offer(surface, sample, limit);
        }
    }
}

/// 语料报告
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub rule_set_version: String,
    /// 成功扫描的发言数
    pub scanned: u64,
    /// 跳过的发言数（无法读取或过长）
    pub skipped: u64,
    pub categories: BTreeMap<Category, CategoryStats>,
}

impl ArtifactReport {
    pub fn new(rule_set_version: impl Into<String>) -> Self {
        Self {
            rule_set_version: rule_set_version.into(),
            ..Default::default()
        }
    }

    /// 记录一条被跳过的发言
    pub fn record_skipped(&mut self, error: &ScanError) {
        tracing::warn!("跳过发言: {}", error);
        self.skipped += 1;
    }

    /// 合并另一个（部分）报告
    ///
    /// 计数相加，样本取并集后截断；与合并顺序无关
    pub fn merge(&mut self, other: ArtifactReport, sample_limit: usize) {
        self.scanned += other.scanned;
        self.skipped += other.skipped;
        for (category, stats) in other.categories {
            self.categories
                .entry(category)
                .or_default()
                .merge(stats, sample_limit);
        }
    }

    pub fn stats(&self, category: Category) -> Option<&CategoryStats> {
        self.categories.get(&category)
    }

    pub fn count(&self, category: Category) -> u64 {
        self.stats(category).map(|s| s.count).unwrap_or(0)
    }

    pub fn total_matches(&self) -> u64 {
        self.categories.values().map(|s| s.count).sum()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// 人工核对用的摘要（每个类别一行，最后一行为合计）
    pub fn summary_lines(&self, top: usize) -> Vec<String> {
        let mut lines: Vec<String> = self
            .categories
            .iter()
            .map(|(category, stats)| {
                let examples: Vec<&str> = stats.samples.keys().take(top).map(String::as_str).collect();
                format!(
                    "{:<22} {:>8} 次  {:>3} 个样本  {}",
                    category.as_str(),
                    stats.count,
                    stats.samples.len(),
                    examples.join(" | ")
                )
            })
            .collect();
        lines.push(format!(
            "合计: {} 次匹配, 扫描 {} 条发言, 跳过 {} 条 (规则集 {})",
            self.total_matches(),
            self.scanned,
            self.skipped,
            self.rule_set_version
        ));
        lines
    }

    /// 已核对数量不足 `min_instances` 的类别
    pub fn needs_verification(
        &self,
        status: &VerificationStatus,
        min_instances: u64,
    ) -> Vec<PendingVerification> {
        self.categories
            .iter()
            .filter(|(_, stats)| stats.count > 0)
            .filter_map(|(category, stats)| {
                let verified = status.verified(*category);
                if verified >= min_instances {
                    return None;
                }
                let sources: BTreeSet<String> = stats
                    .samples
                    .values()
                    .filter_map(|s| s.source.clone())
                    .collect();
                Some(PendingVerification {
                    category: *category,
                    seen: stats.count,
                    verified,
                    missing: min_instances - verified,
                    sources: sources.into_iter().collect(),
                })
            })
            .collect()
    }
}

// ============================================================================
// 核对状态
// ============================================================================

/// 各类别已人工核对的实例数（`{category: verified_count}`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationStatus {
    counts: BTreeMap<Category, u64>,
}

impl VerificationStatus {
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let status = Self::from_json(&content)?;
        tracing::info!("核对状态已加载: {} 个类别", status.counts.len());
        Ok(status)
    }

    pub fn verified(&self, category: Category) -> u64 {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn record(&mut self, category: Category, instances: u64) {
        *self.counts.entry(category).or_default() += instances;
    }
}

/// 需要补充核对的类别
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingVerification {
    pub category: Category,
    pub seen: u64,
    pub verified: u64,
    pub missing: u64,
    /// 样本所在的转录来源
    pub sources: Vec<String>,
}

// ============================================================================
// 扫描
// ============================================================================

/// 扫描参数
#[derive(Debug, Clone)]
pub struct ReporterOptions {
    /// 每个类别保留的样本数
    pub sample_limit: usize,
    /// 样本上下文左右各保留的字符数
    pub context_chars: usize,
    /// 工作线程数（0 = 可用并行度）
    pub workers: usize,
    /// 超过该长度的发言跳过
    pub max_utterance_bytes: usize,
}

impl Default for ReporterOptions {
    fn default() -> Self {
        Self {
            sample_limit: 20,
            context_chars: 40,
            workers: 0,
            max_utterance_bytes: 64 * 1024,
        }
    }
}

/// 语料报告器
pub struct ArtifactReporter {
    rules: Arc<RuleSet>,
    options: ReporterOptions,
}

impl ArtifactReporter {
    pub fn new(rules: Arc<RuleSet>, options: ReporterOptions) -> Self {
        Self { rules, options }
    }

    pub fn options(&self) -> &ReporterOptions {
        &self.options
    }

    /// 扫描语料
    pub fn scan(&self, corpus: &[Utterance]) -> ArtifactReport {
        let workers = self.worker_count(corpus.len());
        let limit = self.options.sample_limit;
        tracing::info!("开始扫描 {} 条发言 ({} 个线程)", corpus.len(), workers);

        if workers <= 1 {
            return self.scan_chunk(0, corpus);
        }

        let chunk_size = corpus.len().div_ceil(workers);
        let (tx, rx) = bounded::<ArtifactReport>(workers);
        let mut report = ArtifactReport::new(self.rules.version());

        thread::scope(|scope| {
            for (index, chunk) in corpus.chunks(chunk_size).enumerate() {
                let tx = tx.clone();
                scope.spawn(move || {
                    let partial = self.scan_chunk(index * chunk_size, chunk);
                    if tx.send(partial).is_err() {
                        tracing::warn!("报告合并通道已关闭");
                    }
                });
            }
            drop(tx);
            for partial in rx.iter() {
                report.merge(partial, limit);
            }
        });

        tracing::info!(
            "扫描完成: {} 次匹配, 跳过 {} 条",
            report.total_matches(),
            report.skipped
        );
        report
    }

    fn worker_count(&self, items: usize) -> usize {
        let configured = match self.options.workers {
            0 => thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            n => n,
        };
        configured.min(items).max(1)
    }

    /// 扫描连续的一段发言，`base` 为第一条在语料中的序号
    fn scan_chunk(&self, base: usize, chunk: &[Utterance]) -> ArtifactReport {
        let mut report = ArtifactReport::new(self.rules.version());
        for (i, utterance) in chunk.iter().enumerate() {
            match self.scan_one(base + i, utterance, &mut report) {
                Ok(()) => report.scanned += 1,
                Err(e) => report.record_skipped(&e),
            }
        }
        report
    }

    fn scan_one(&self, index: usize, utterance: &Utterance, report: &mut ArtifactReport) -> Result<(), ScanError> {
        let text = utterance.text.as_str();
        if text.len() > self.options.max_utterance_bytes {
            return Err(ScanError::TooLong {
                len: text.len(),
                limit: self.options.max_utterance_bytes,
            });
        }

        let limit = self.options.sample_limit;
        let tokens = Tokenizer::tokenize(text);
        let matches = classifier::classify(&self.rules, text, &tokens);

        let mut sample = |category: Category, start: usize, end: usize| {
            let stats = report.categories.entry(category).or_default();
            let sample = Sample {
                context: context_around(text, start, end, self.options.context_chars),
                source: utterance.source.clone(),
                utterance: index,
                offset: start,
            };
            stats.record(&text[start..end], sample, limit);
        };

        for m in &matches {
            sample(m.category, m.start, m.end);
        }

        // 没有被任何规则覆盖的数字和括号片段：规则目录的缺口
        let mut next_match = matches.iter().peekable();
        for token in &tokens {
            while next_match.peek().is_some_and(|m| m.end <= token.start) {
                next_match.next();
            }
            let covered = next_match.peek().is_some_and(|m| m.start <= token.start);
            if !covered && matches!(token.kind, TokenKind::Numeral | TokenKind::Bracketed) {
                sample(Category::Unclassified, token.start, token.end);
            }
        }
        Ok(())
    }
}

/// 匹配左右各 `width` 个字符的上下文
fn context_around(text: &str, start: usize, end: usize, width: usize) -> String {
    let left = text[..start]
        .char_indices()
        .rev()
        .take(width)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let right = text[end..]
        .char_indices()
        .nth(width)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[left..right].to_string()
}
