//! TNL 类型定义

use std::fmt;

use serde::{Deserialize, Serialize};

/// 发言片段（一个说话人的连续发言）
///
/// 上游转录解析的产物，只读；规范化不会修改它
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// 书面转录文本
    pub text: String,
    /// 起始时间（秒）
    #[serde(default, alias = "start")]
    pub start_sec: f64,
    /// 结束时间（秒）
    #[serde(default, alias = "stop")]
    pub end_sec: f64,
    /// 说话人
    #[serde(default)]
    pub speaker: String,
    /// 来源（转录文件路径或 ID），用于报告溯源
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Utterance {
    pub fn new(text: impl Into<String>, start_sec: f64, end_sec: f64, speaker: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start_sec,
            end_sec,
            speaker: speaker.into(),
            source: None,
        }
    }

    /// 仅有文本的发言（测试与工具使用）
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(text, 0.0, 0.0, "")
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// 规则类别（封闭集合）
///
/// 感知类（awareness）类别只报告、不改写；把它们提升为正式规则只需修改规则数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    DocketId,
    VoteTally,
    NumberRange,
    Year,
    HistoricalYear,
    Age,
    Currency,
    SectionNumber,
    Acronym,
    AcronymAsWord,
    NegationNo,
    CitationNo,
    UnspokenHeader,
    RomanNumeral,
    Percentage,
    Decade,
    OrdinalWord,
    StatuteCitation,
    LeadingDecimal,
    NonSpeechBracket,
    EditorialBracket,
    Symbol,
    Cardinal,
    Ordinal,
    Abbreviation,
    /// 月份 + 日期（January 5, 1983）
    Date,
    // 感知类
    /// 单字母缩写名（John W. Smith）
    Initial,
    Ellipsis,
    StructuralBracket,
    NumberedListMarker,
    MixedCase,
    NonAscii,
    Unclassified,
}

impl Category {
    /// 报告中使用的键名（与序列化名一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DocketId => "docket_id",
            Category::VoteTally => "vote_tally",
            Category::NumberRange => "number_range",
            Category::Year => "year",
            Category::HistoricalYear => "historical_year",
            Category::Age => "age",
            Category::Currency => "currency",
            Category::SectionNumber => "section_number",
            Category::Acronym => "acronym",
            Category::AcronymAsWord => "acronym_as_word",
            Category::NegationNo => "negation_no",
            Category::CitationNo => "citation_no",
            Category::UnspokenHeader => "unspoken_header",
            Category::RomanNumeral => "roman_numeral",
            Category::Percentage => "percentage",
            Category::Decade => "decade",
            Category::OrdinalWord => "ordinal_word",
            Category::StatuteCitation => "statute_citation",
            Category::LeadingDecimal => "leading_decimal",
            Category::NonSpeechBracket => "non_speech_bracket",
            Category::EditorialBracket => "editorial_bracket",
            Category::Symbol => "symbol",
            Category::Cardinal => "cardinal",
            Category::Ordinal => "ordinal",
            Category::Abbreviation => "abbreviation",
            Category::Date => "date",
            Category::Initial => "initial",
            Category::Ellipsis => "ellipsis",
            Category::StructuralBracket => "structural_bracket",
            Category::NumberedListMarker => "numbered_list_marker",
            Category::MixedCase => "mixed_case",
            Category::NonAscii => "non_ascii",
            Category::Unclassified => "unclassified",
        }
    }

    /// 是否为只报告不改写的感知类别
    pub fn is_awareness_only(&self) -> bool {
        matches!(
            self,
            Category::Ellipsis
                | Category::StructuralBracket
                | Category::NumberedListMarker
                | Category::MixedCase
                | Category::NonAscii
                | Category::Initial
                | Category::Unclassified
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 分类结果：某条规则命中的 token 区间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// 起始 token 下标
    pub first_token: usize,
    /// 结束 token 下标（不含）
    pub end_token: usize,
    /// 原文起始字节偏移
    pub start: usize,
    /// 原文结束字节偏移（不含）
    pub end: usize,
    pub category: Category,
    pub rule_id: String,
    /// 规则优先级（越小越先生效）
    pub priority: i32,
    /// 规则在规则集中的序号，用于排序时打破平局
    #[serde(skip)]
    pub rule_index: usize,
    /// 与本匹配重叠、在消歧中落选的规则
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub displaced: Vec<String>,
}

impl Match {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn overlaps(&self, other: &Match) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// 对齐片段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentKind {
    /// 原样保留（一一对应）
    Verbatim,
    /// 被改写
    Rewritten,
    /// 被删除（无对应的规范化片段）
    Deleted,
}

/// 原文区间 → 规范化区间的映射
///
/// 所有偏移均为字节偏移；`Deleted` 片段的规范化区间为 `None`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentSpan {
    pub original_start: usize,
    pub original_end: usize,
    pub normalized: Option<(usize, usize)>,
    pub kind: AlignmentKind,
}

impl AlignmentSpan {
    pub fn is_deleted(&self) -> bool {
        self.normalized.is_none()
    }
}

/// 实际应用的匹配（审计用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedMatch {
    /// 原文
    pub original: String,
    /// 替换文本；`None` 表示被删除
    pub replaced: Option<String>,
    /// 起始位置（字节偏移）
    pub start: usize,
    /// 结束位置（字节偏移）
    pub end: usize,
    pub category: Category,
    pub rule_id: String,
    /// 在消歧中落选的重叠规则
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub displaced: Vec<String>,
}

/// 诊断类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// 数字片段无法解析，已原样保留
    MalformedNumericToken,
    /// 没有例外表条目的缩写，已按字母拼读
    UnknownAcronym,
    /// 命中了需要人工复核的边界规则
    NeedsReview,
    /// 嵌套改写过深，已原样保留
    NestingLimit,
}

/// 规范化过程中的非致命诊断
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub rule_id: String,
    /// 相关原文
    pub surface: String,
    pub start: usize,
    pub end: usize,
    pub message: String,
}

/// 规范化结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationResult {
    /// 规范化后的文本
    pub normalized_text: String,
    /// 是否有改动
    pub changed: bool,
    /// 按原文顺序排列、无缝覆盖原文的对齐片段
    pub alignment_spans: Vec<AlignmentSpan>,
    /// 已应用的匹配（含原样保留的审计匹配）
    pub applied_matches: Vec<AppliedMatch>,
    /// 非致命诊断
    pub diagnostics: Vec<Diagnostic>,
    /// 规则集版本
    pub rule_set_version: String,
    /// 处理耗时（微秒）
    pub elapsed_us: u64,
}

impl NormalizationResult {
    /// 创建无修改的结果
    pub fn unchanged(text: String, rule_set_version: String, elapsed_us: u64) -> Self {
        let alignment_spans = if text.is_empty() {
            Vec::new()
        } else {
            vec![AlignmentSpan {
                original_start: 0,
                original_end: text.len(),
                normalized: Some((0, text.len())),
                kind: AlignmentKind::Verbatim,
            }]
        };
        Self {
            normalized_text: text,
            changed: false,
            alignment_spans,
            applied_matches: Vec::new(),
            diagnostics: Vec::new(),
            rule_set_version,
            elapsed_us,
        }
    }

    /// 原文区间对应的规范化区间（跨越删除片段时取并集）
    pub fn map_original_range(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let mut mapped: Option<(usize, usize)> = None;
        for span in &self.alignment_spans {
            if span.original_end <= start || span.original_start >= end {
                continue;
            }
            if let Some((mut ns, mut ne)) = span.normalized {
                // 原样片段逐字节对应，可以精确裁剪
                if span.kind == AlignmentKind::Verbatim {
                    ns += start.saturating_sub(span.original_start);
                    ne -= span.original_end.saturating_sub(end);
                }
                mapped = Some(match mapped {
                    Some((ms, me)) => (ms.min(ns), me.max(ne)),
                    None => (ns, ne),
                });
            }
        }
        mapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serde_names_match_as_str() {
        for category in [
            Category::DocketId,
            Category::AcronymAsWord,
            Category::NonSpeechBracket,
            Category::NumberedListMarker,
            Category::Date,
            Category::Initial,
        ] {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn test_awareness_categories() {
        assert!(Category::MixedCase.is_awareness_only());
        assert!(Category::Unclassified.is_awareness_only());
        assert!(Category::Initial.is_awareness_only());
        assert!(!Category::DocketId.is_awareness_only());
        assert!(!Category::Date.is_awareness_only());
    }

    #[test]
    fn test_utterance_accepts_transcript_field_names() {
        let u: Utterance =
            serde_json::from_str(r#"{"text": "Yes.", "start": 1.5, "stop": 2.0, "speaker": "Roberts"}"#)
                .unwrap();
        assert_eq!(u.start_sec, 1.5);
        assert_eq!(u.end_sec, 2.0);
        assert!(u.source.is_none());
    }

    #[test]
    fn test_unchanged_result_covers_text() {
        let result = NormalizationResult::unchanged("hello".to_string(), "v".to_string(), 0);
        assert_eq!(result.alignment_spans.len(), 1);
        assert_eq!(result.map_original_range(1, 3), Some((1, 3)));
    }
}
