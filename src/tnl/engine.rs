//! TNL 主引擎
//!
//! 组合分词、候选匹配、消歧、改写和片段编辑

use std::sync::Arc;
use std::time::Instant;

use crate::tnl::classifier;
use crate::tnl::error::RuleSetError;
use crate::tnl::rewrite::{Rewrite, RewriteEngine};
use crate::tnl::rules::RuleSet;
use crate::tnl::span_editor::SpanEditor;
use crate::tnl::tokenizer::{Token, TokenKind, Tokenizer};
use crate::tnl::types::{
    AlignmentSpan, AppliedMatch, Diagnostic, DiagnosticKind, Match, NormalizationResult, Utterance,
};

/// 编辑性括号允许的最大嵌套深度
const MAX_NESTING_DEPTH: usize = 3;

/// 单次规范化的中间结果
struct Pass {
    text: String,
    alignment_spans: Vec<AlignmentSpan>,
    applied_matches: Vec<AppliedMatch>,
    diagnostics: Vec<Diagnostic>,
}

/// TNL 引擎（可复用，规则集只读共享）
#[derive(Clone)]
pub struct TnlEngine {
    rules: Arc<RuleSet>,
    /// 未分类片段写入 trace 日志
    log_unclassified: bool,
}

impl TnlEngine {
    /// 创建 TNL 引擎
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            rules,
            log_unclassified: false,
        }
    }

    /// 使用内置规则集
    pub fn builtin() -> Result<Self, RuleSetError> {
        Ok(Self::new(Arc::new(RuleSet::builtin()?)))
    }

    pub fn with_unclassified_logging(mut self, enabled: bool) -> Self {
        self.log_unclassified = enabled;
        self
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    pub fn shared_rule_set(&self) -> Arc<RuleSet> {
        Arc::clone(&self.rules)
    }

    /// 分类（不改写）：返回消歧后的匹配
    pub fn classify(&self, text: &str) -> Vec<Match> {
        let tokens = Tokenizer::tokenize(text);
        classifier::classify(&self.rules, text, &tokens)
    }

    /// 规范化一条发言
    ///
    /// 发言本身不会被修改
    pub fn normalize(&self, utterance: &Utterance) -> NormalizationResult {
        let result = self.normalize_text(&utterance.text);
        if !result.diagnostics.is_empty() {
            tracing::debug!(
                "TNL: 发言 [{}] {:.2}-{:.2} 产生 {} 条诊断",
                utterance.speaker,
                utterance.start_sec,
                utterance.end_sec,
                result.diagnostics.len()
            );
        }
        result
    }

    /// 规范化文本
    ///
    /// 不可失败：任何异常都降级为诊断并原样保留对应片段
    pub fn normalize_text(&self, text: &str) -> NormalizationResult {
        let start = Instant::now();

        if text.is_empty() {
            return NormalizationResult::unchanged(String::new(), self.rules.version().to_string(), 0);
        }

        let pass = self.run(text, 0);
        let elapsed_us = start.elapsed().as_micros() as u64;
        let changed = pass.text != text;

        NormalizationResult {
            normalized_text: pass.text,
            changed,
            alignment_spans: pass.alignment_spans,
            applied_matches: pass.applied_matches,
            diagnostics: pass.diagnostics,
            rule_set_version: self.rules.version().to_string(),
            elapsed_us,
        }
    }

    fn run(&self, text: &str, depth: usize) -> Pass {
        let tokens = Tokenizer::tokenize(text);
        let matches = classifier::classify(&self.rules, text, &tokens);

        if self.log_unclassified {
            self.trace_unclassified(text, &tokens, &matches);
        }

        let rewriter = RewriteEngine::new(self.rules.exceptions());
        let mut editor = SpanEditor::new(text);
        let mut applied_matches = Vec::with_capacity(matches.len());
        let mut diagnostics = Vec::new();

        for m in &matches {
            let Some(rule) = self.rules.catalog().rule(m.rule_index) else {
                tracing::warn!("TNL: 匹配引用了不存在的规则 {}", m.rule_id);
                continue;
            };
            let surface = &text[m.start..m.end];

            if rule.review {
                diagnostics.push(diagnostic(
                    DiagnosticKind::NeedsReview,
                    m,
                    surface,
                    "命中待复核的边界规则，已原样保留".to_string(),
                ));
            }

            let rewrite = match rewriter.rewrite(&rule.rewrite, m, text, &tokens) {
                Ok(rewrite) => rewrite,
                Err(e) => {
                    tracing::warn!("TNL: 规则 {} 改写 {:?} 失败: {}", m.rule_id, surface, e);
                    diagnostics.push(diagnostic(
                        DiagnosticKind::MalformedNumericToken,
                        m,
                        surface,
                        e.to_string(),
                    ));
                    continue;
                }
            };

            let replaced = match rewrite {
                Rewrite::Keep => Some(surface.to_string()),
                Rewrite::Strip => {
                    editor.strip(m.start, m.end);
                    None
                }
                Rewrite::Replace(replacement) => {
                    if replacement != surface {
                        editor.replace(m.start, m.end, &replacement);
                    }
                    Some(replacement)
                }
                Rewrite::Spelled(replacement) => {
                    diagnostics.push(diagnostic(
                        DiagnosticKind::UnknownAcronym,
                        m,
                        surface,
                        format!("例外表中没有 {}，按字母拼读", surface.trim_end_matches('.')),
                    ));
                    editor.replace(m.start, m.end, &replacement);
                    Some(replacement)
                }
                Rewrite::Nested(inner) => {
                    if depth >= MAX_NESTING_DEPTH {
                        diagnostics.push(diagnostic(
                            DiagnosticKind::NestingLimit,
                            m,
                            surface,
                            format!("嵌套超过 {} 层，已原样保留", MAX_NESTING_DEPTH),
                        ));
                        continue;
                    }
                    let nested = self.run(&inner, depth + 1);
                    // 内层诊断的偏移换算到外层括号
                    diagnostics.extend(nested.diagnostics.into_iter().map(|mut d| {
                        d.start = m.start;
                        d.end = m.end;
                        d
                    }));
                    if nested.text.trim().is_empty() {
                        editor.strip(m.start, m.end);
                        None
                    } else {
                        editor.replace(m.start, m.end, &nested.text);
                        Some(nested.text)
                    }
                }
            };

            tracing::trace!("TNL: {} [{}] {:?} -> {:?}", m.category, m.rule_id, surface, replaced);
            applied_matches.push(AppliedMatch {
                original: surface.to_string(),
                replaced,
                start: m.start,
                end: m.end,
                category: m.category,
                rule_id: m.rule_id.clone(),
                displaced: m.displaced.clone(),
            });
        }

        let (normalized, alignment_spans) = editor.finish();
        Pass {
            text: normalized,
            alignment_spans,
            applied_matches,
            diagnostics,
        }
    }

    /// 记录没有被任何规则覆盖的数字、括号、符号 token
    fn trace_unclassified(&self, text: &str, tokens: &[Token<'_>], matches: &[Match]) {
        let mut covered = matches.iter().peekable();
        for token in tokens {
            while covered.peek().is_some_and(|m| m.end <= token.start) {
                covered.next();
            }
            let inside = covered
                .peek()
                .is_some_and(|m| m.start <= token.start && token.end <= m.end);
            if inside || matches!(token.kind, TokenKind::Word | TokenKind::Punct) {
                continue;
            }
            tracing::trace!(
                "TNL: 未分类片段 {:?} @{} in {:?}",
                token.text,
                token.start,
                text
            );
        }
    }
}

fn diagnostic(kind: DiagnosticKind, m: &Match, surface: &str, message: String) -> Diagnostic {
    Diagnostic {
        kind,
        rule_id: m.rule_id.clone(),
        surface: surface.to_string(),
        start: m.start,
        end: m.end,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tnl::span_editor::spans_tile;
    use crate::tnl::types::{AlignmentKind, Category};

    fn engine() -> TnlEngine {
        TnlEngine::builtin().unwrap()
    }

    fn normalized(text: &str) -> String {
        engine().normalize_text(text).normalized_text
    }

    #[test]
    fn test_docket_after_case() {
        assert_eq!(
            normalized("Case 21-1164, Wilkins versus the United States."),
            "Case twenty one eleven sixty four, Wilkins versus the United States."
        );
    }

    #[test]
    fn test_negation_no_is_unchanged() {
        let result = engine().normalize_text("No. I --");
        assert_eq!(result.normalized_text, "No. I --");
        assert!(!result.changed);
        assert!(result
            .applied_matches
            .iter()
            .any(|m| m.category == Category::NegationNo));
    }

    #[test]
    fn test_citation_no_before_docket() {
        assert_eq!(
            normalized("No. 96-511, Reno versus ACLU"),
            "Number ninety six five eleven, Reno versus ACLU"
        );
    }

    #[test]
    fn test_vote_tally() {
        assert_eq!(normalized("9-0"), "nine to zero");
        assert_eq!(
            normalized("The vote was 5-4 in that case."),
            "The vote was five to four in that case."
        );
    }

    #[test]
    fn test_header_is_stripped_and_marked_deleted() {
        let text = "Mr. McCoy. ORAL ARGUMENT OF JEFFREY W. McCOY";
        let result = engine().normalize_text(text);
        assert_eq!(result.normalized_text, "Mister McCoy.");

        let deleted: Vec<&AlignmentSpan> = result
            .alignment_spans
            .iter()
            .filter(|s| s.kind == AlignmentKind::Deleted)
            .collect();
        assert_eq!(deleted.len(), 1);
        assert_eq!(
            text[deleted[0].original_start..deleted[0].original_end].trim(),
            "ORAL ARGUMENT OF JEFFREY W. McCOY"
        );
    }

    #[test]
    fn test_same_shape_different_category() {
        assert_eq!(normalized("Section 802"), "Section eight oh two");
        assert_eq!(normalized("in 1983"), "in nineteen eighty three");

        let categories: Vec<Category> = engine()
            .classify("Section 1983 mirrors a statute from 1787")
            .iter()
            .map(|m| m.category)
            .collect();
        assert_eq!(categories, vec![Category::SectionNumber, Category::HistoricalYear]);
    }

    #[test]
    fn test_assorted_categories() {
        let cases = [
            ("It cost $40,000.", "It cost forty thousand dollars."),
            ("about 50% of them", "about fifty percent of them"),
            ("a .66 ratio", "a point six six ratio"),
            ("the 22nd day", "the twenty second day"),
            ("in the 1980s", "in the nineteen eighties"),
            ("the BIA said", "the Bee I Ay said"),
            ("the WOS report", "the Woes report"),
            ("the XIV Amendment", "the fourteenth Amendment"),
            ("Title VII claims", "Title seven claims"),
            ("under 21 U.S.C. 841", "under twenty one You Ess See eight forty one"),
            ("\u{a7}1983 suits", "Section nineteen eighty three suits"),
            ("the V-chip rule", "the Vee-chip rule"),
            ("he was 94 years old", "he was ninety four years old"),
            ("Yes. (Laughter.)", "Yes."),
            ("[Inaudible] We think so.", "We think so."),
        ];
        let engine = engine();
        for (input, expected) in cases {
            assert_eq!(engine.normalize_text(input).normalized_text, expected, "input: {}", input);
        }
    }

    #[test]
    fn test_editorial_bracket_is_normalized_recursively() {
        assert_eq!(
            normalized("in case [= No. 21-1164] today"),
            "in case Number twenty one eleven sixty four today"
        );
    }

    #[test]
    fn test_review_and_unknown_acronym_diagnostics() {
        let result = engine().normalize_text("See No. 5 and the BIA.");
        let kinds: Vec<DiagnosticKind> = result.diagnostics.iter().map(|d| d.kind).collect();
        assert!(kinds.contains(&DiagnosticKind::NeedsReview));
        assert!(kinds.contains(&DiagnosticKind::UnknownAcronym));
        assert!(result.normalized_text.starts_with("See No. five"));
    }

    #[test]
    fn test_malformed_numeral_passes_through() {
        let result = engine().normalize_text("Case 21-1164 and Section 1983a");
        assert!(result.diagnostics.is_empty());

        let rules = RuleSet::from_json(
            r#"{"version": "t", "rules": [
                {"id": "bad_docket", "category": "docket_id", "priority": 1,
                 "pattern": [{"regex": "^\\d+$"}], "rewrite": {"kind": "docket"}}]}"#,
        )
        .unwrap();
        let result = TnlEngine::new(Arc::new(rules)).normalize_text("page 12 here");
        assert_eq!(result.normalized_text, "page 12 here");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::MalformedNumericToken);
        assert_eq!(result.diagnostics[0].surface, "12");
    }

    #[test]
    fn test_alignment_tiles_original() {
        let engine = engine();
        for text in [
            "Case 21-1164, Wilkins versus the United States.",
            "Mr. McCoy. ORAL ARGUMENT OF JEFFREY W. McCOY",
            "[Laughter] (Inaudible) Yes, \u{a7}1983.",
            "plain text with nothing to do",
        ] {
            let result = engine.normalize_text(text);
            assert!(spans_tile(&result.alignment_spans, text.len()), "input: {}", text);
        }
    }

    #[test]
    fn test_alignment_maps_rewritten_span() {
        let text = "Section 802 applies";
        let result = engine().normalize_text(text);
        let (start, end) = result.map_original_range(8, 11).unwrap();
        assert_eq!(&result.normalized_text[start..end], "eight oh two");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let engine = engine();
        for text in [
            "Case 21-1164, Wilkins versus the United States.",
            "No. 96-511, Reno versus ACLU",
            "Mr. McCoy. ORAL ARGUMENT OF JEFFREY W. McCOY",
            "Section 802 was passed in 1983 by a 9-0 vote.",
            "It cost $40,000 in the 1980s.",
        ] {
            let once = engine.normalize_text(text).normalized_text;
            let twice = engine.normalize_text(&once);
            assert_eq!(twice.normalized_text, once, "input: {}", text);
            assert!(!twice.changed);
        }
    }

    #[test]
    fn test_classification_is_deterministic_and_non_overlapping() {
        let engine = engine();
        let text = "No. 21-1164, the vote was 9-0 on \u{a7} 1983 in 1983 for $3 million.";
        let first = engine.classify(text);
        for _ in 0..5 {
            assert_eq!(engine.classify(text), first);
        }
        for pair in first.windows(2) {
            assert!(!pair[0].overlaps(&pair[1]));
        }
    }

    #[test]
    fn test_utterance_is_not_mutated() {
        let utterance = Utterance::new("in 1983", 1.5, 2.0, "Justice Kagan");
        let result = engine().normalize(&utterance);
        assert_eq!(utterance.text, "in 1983");
        assert_eq!(result.normalized_text, "in nineteen eighty three");
        assert_eq!(result.rule_set_version, "court-v2");
    }

    #[test]
    fn test_empty_text() {
        let result = engine().normalize_text("");
        assert!(!result.changed);
        assert!(result.alignment_spans.is_empty());
    }

    #[test]
    fn test_header_tail_keeps_following_speech() {
        assert_eq!(normalized("ORAL ARGUMENT OF JOHN DOE I think so."), "I think so.");
        assert_eq!(normalized("ORAL ARGUMENT OF JOHN DOE A case like this."), "A case like this.");
        assert_eq!(
            normalized("ORAL ARGUMENT OF JOHN DOE ON BEHALF OF THE PETITIONER MR. DOE: Mr. Chief Justice"),
            "Mister Chief Justice"
        );
    }

    #[test]
    fn test_header_and_label_are_separate_matches() {
        let result = engine()
            .normalize_text("ORAL ARGUMENT OF JOHN DOE ON BEHALF OF THE PETITIONER MR. DOE: Thank you.");
        let stripped: Vec<&str> = result
            .applied_matches
            .iter()
            .filter(|m| m.category == Category::UnspokenHeader)
            .map(|m| m.rule_id.as_str())
            .collect();
        assert_eq!(stripped, vec!["argument_header", "speaker_label"]);
        assert_eq!(result.normalized_text, "Thank you.");
    }

    #[test]
    fn test_month_day_date() {
        assert_eq!(
            normalized("argued January 5, 1983 in Washington"),
            "argued January fifth, nineteen eighty three in Washington"
        );
        assert_eq!(normalized("on March 22nd we heard it"), "on March twenty second we heard it");
        assert_eq!(
            engine().classify("since May 3")[0].category,
            Category::Date
        );
    }

    #[test]
    fn test_common_abbreviations() {
        assert_eq!(normalized("St. Louis, e.g."), "Saint Louis, for example");
        assert_eq!(normalized("apples, pears, etc."), "apples, pears, et cetera");
        assert_eq!(normalized("see Vol. 3"), "see Volume three");

        let result = engine().normalize_text("under Sec. 5");
        assert_eq!(result.normalized_text, "under Sec. five");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::NeedsReview && d.surface == "Sec."));
    }

    #[test]
    fn test_middle_initial_is_kept() {
        let result = engine().normalize_text("John W. Smith argued");
        assert_eq!(result.normalized_text, "John W. Smith argued");
        assert!(!result.changed);
        assert!(result
            .applied_matches
            .iter()
            .any(|m| m.category == Category::Initial && m.rule_id == "initial"));

        // 句末的单字母不算缩写
        assert!(engine()
            .classify("plan A.")
            .iter()
            .all(|m| m.category != Category::Initial));
    }

    #[test]
    fn test_displaced_candidates_are_reported() {
        let result = engine().normalize_text("Case 21-1164, Wilkins versus the United States.");
        let docket = result
            .applied_matches
            .iter()
            .find(|m| m.rule_id == "docket_after_case")
            .unwrap();
        assert!(docket.displaced.iter().any(|id| id == "number_range"));
        assert!(!docket.displaced.iter().any(|id| id == "docket_after_case"));
    }

    #[test]
    fn test_zero_padded_docket() {
        assert_eq!(normalized("Case 01-1234"), "Case oh one twelve thirty four");
        assert_eq!(normalized("No. 01-1234"), "Number oh one twelve thirty four");
    }

    #[test]
    fn test_repeated_elements_scale_linearly() {
        let engine = engine();
        let timed = |n: usize| {
            let text = "JUSTICE ".repeat(n);
            (0..3)
                .map(|_| {
                    let started = Instant::now();
                    let result = engine.normalize_text(&text);
                    assert!(!result.changed);
                    started.elapsed()
                })
                .min()
                .unwrap()
        };

        let small = timed(1000).as_secs_f64().max(1e-6);
        let large = timed(8000).as_secs_f64();
        // 线性约 8 倍，平方级约 64 倍
        assert!(large / small < 24.0, "1000 词 {:.4}s，8000 词 {:.4}s", small, large);
    }

    #[test]
    fn test_performance() {
        let engine = engine();
        let text = "Case 21-1164, Wilkins versus the United States. Mr. McCoy, under 42 U.S.C. 1983 \
                    the vote was 9-0 in 1983 and the BIA cost $40,000.";

        let result = engine.normalize_text(text);

        // 目标 <50ms = 50000us
        assert!(
            result.elapsed_us < 50_000,
            "耗时 {}us 超过 50ms",
            result.elapsed_us
        );
    }
}
