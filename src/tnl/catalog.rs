//! TNL 模式目录
//!
//! 把声明式规则编译为 token 匹配器，并在每个锚点上穷举尝试所有规则。
//! 重叠候选在这里全部保留，由分类器统一裁决。

use regex::Regex;

use crate::tnl::classifier::ContextPredicate;
use crate::tnl::error::RuleSetError;
use crate::tnl::rules::{ExceptionTable, Repeat, RewriteSpec, RuleSpec, TokenPatternSpec};
use crate::tnl::tokenizer::{Token, TokenKind};
use crate::tnl::types::{Category, Match};

/// 编译后的单 token 匹配条件
#[derive(Debug)]
struct TokenMatcher {
    regex: Option<Regex>,
    any: Vec<String>,
    not_any: Vec<String>,
    case_sensitive: bool,
    kind: Option<TokenKind>,
    in_exceptions: bool,
    attached: bool,
    prev_any: Vec<String>,
    next_attached: Option<Regex>,
    one_of: Vec<TokenMatcher>,
    repeat: Repeat,
}

impl TokenMatcher {
    fn compile(rule_id: &str, spec: &TokenPatternSpec) -> Result<Self, RuleSetError> {
        let compile_regex = |source: &Option<String>| {
            source
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| RuleSetError::regex(rule_id, e))
        };
        let one_of = spec
            .one_of
            .iter()
            .map(|alt| Self::compile(rule_id, alt))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            regex: compile_regex(&spec.regex)?,
            any: spec.any.clone(),
            not_any: spec.not_any.clone(),
            case_sensitive: spec.case_sensitive,
            kind: spec.kind,
            in_exceptions: spec.in_exceptions,
            attached: spec.attached,
            prev_any: spec.prev_any.clone(),
            next_attached: compile_regex(&spec.next_attached)?,
            one_of,
            repeat: spec.repeat,
        })
    }

    fn literal_hit(&self, literals: &[String], text: &str) -> bool {
        literals.iter().any(|candidate| {
            if self.case_sensitive {
                candidate == text
            } else {
                candidate.eq_ignore_ascii_case(text)
            }
        })
    }

    /// `pos` 处的 token 是否满足全部条件
    ///
    /// 结果只取决于 `pos`，与匹配从哪个锚点开始无关
    fn accepts(&self, tokens: &[Token<'_>], pos: usize, exceptions: &ExceptionTable) -> bool {
        let Some(token) = tokens.get(pos) else {
            return false;
        };
        let prev = pos.checked_sub(1).and_then(|i| tokens.get(i));

        if let Some(kind) = self.kind {
            if token.kind != kind {
                return false;
            }
        }

        if self.attached && !prev.is_some_and(|p| token.is_attached_to(p)) {
            return false;
        }

        if !self.any.is_empty() && !self.literal_hit(&self.any, token.text) {
            return false;
        }

        if self.literal_hit(&self.not_any, token.text) {
            return false;
        }

        if !self.prev_any.is_empty() && !prev.is_some_and(|p| self.literal_hit(&self.prev_any, p.text)) {
            return false;
        }

        if let Some(regex) = &self.regex {
            if !regex.is_match(token.text) {
                return false;
            }
        }

        if let Some(regex) = &self.next_attached {
            let next_ok = tokens
                .get(pos + 1)
                .is_some_and(|next| next.is_attached_to(token) && regex.is_match(next.text));
            if !next_ok {
                return false;
            }
        }

        if self.in_exceptions && !exceptions.contains(token.text) {
            return false;
        }

        self.one_of.is_empty() || self.one_of.iter().any(|alt| alt.accepts(tokens, pos, exceptions))
    }

    fn is_repeated(&self) -> bool {
        matches!(self.repeat, Repeat::ZeroOrMore | Repeat::OneOrMore)
    }
}

/// 重复元素的游程表：`runs[e][pos]` 为第 e 个元素从 `pos` 起连续满足的 token 数
///
/// 每次分词后从右到左算一遍，匹配时直接查表，整体保持线性
type RepeatRuns = Vec<Option<Vec<usize>>>;

/// 编译后的规则
#[derive(Debug)]
pub struct CompiledRule {
    pub id: String,
    pub category: Category,
    pub priority: i32,
    pub rewrite: RewriteSpec,
    pub review: bool,
    pattern: Vec<TokenMatcher>,
    context: ContextPredicate,
}

impl CompiledRule {
    fn compile(spec: &RuleSpec) -> Result<Self, RuleSetError> {
        let pattern = spec
            .pattern
            .iter()
            .map(|p| TokenMatcher::compile(&spec.id, p))
            .collect::<Result<Vec<_>, _>>()?;
        let context = ContextPredicate::compile(&spec.id, &spec.context)?;

        Ok(Self {
            id: spec.id.clone(),
            category: spec.category,
            priority: spec.priority,
            rewrite: spec.rewrite.clone(),
            review: spec.review,
            pattern,
            context,
        })
    }

    /// 预先计算每个重复元素的游程
    fn repeat_runs(&self, tokens: &[Token<'_>], exceptions: &ExceptionTable) -> RepeatRuns {
        self.pattern
            .iter()
            .map(|element| {
                if !element.is_repeated() {
                    return None;
                }
                let mut runs = vec![0; tokens.len() + 1];
                for pos in (0..tokens.len()).rev() {
                    if element.accepts(tokens, pos, exceptions) {
                        runs[pos] = runs[pos + 1] + 1;
                    }
                }
                Some(runs)
            })
            .collect()
    }

    /// 从 `anchor` 开始贪婪匹配，返回结束 token 下标（不含）
    ///
    /// 不回溯：每个元素尽可能多地消耗 token，重复元素查游程表
    fn match_at(
        &self,
        tokens: &[Token<'_>],
        anchor: usize,
        exceptions: &ExceptionTable,
        runs: &RepeatRuns,
    ) -> Option<usize> {
        let mut pos = anchor;
        for (index, element) in self.pattern.iter().enumerate() {
            match element.repeat {
                Repeat::One => {
                    if !element.accepts(tokens, pos, exceptions) {
                        return None;
                    }
                    pos += 1;
                }
                Repeat::Optional => {
                    if element.accepts(tokens, pos, exceptions) {
                        pos += 1;
                    }
                }
                Repeat::ZeroOrMore | Repeat::OneOrMore => {
                    let run = runs
                        .get(index)
                        .and_then(|r| r.as_ref())
                        .and_then(|r| r.get(pos))
                        .copied()
                        .unwrap_or(0);
                    if element.repeat == Repeat::OneOrMore && run == 0 {
                        return None;
                    }
                    pos += run;
                }
            }
        }
        (pos > anchor).then_some(pos)
    }
}

/// 模式目录（规则的唯一所有者）
#[derive(Debug, Default)]
pub struct PatternCatalog {
    rules: Vec<CompiledRule>,
}

impl PatternCatalog {
    pub fn compile(specs: &[RuleSpec]) -> Result<Self, RuleSetError> {
        let rules = specs
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, index: usize) -> Option<&CompiledRule> {
        self.rules.get(index)
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// 收集所有候选匹配
    ///
    /// 每条规则在每个锚点都尝试一次；结果按（锚点, 规则序号）的确定顺序返回
    pub fn match_candidates(
        &self,
        text: &str,
        tokens: &[Token<'_>],
        exceptions: &ExceptionTable,
    ) -> Vec<Match> {
        let mut candidates = Vec::new();
        let runs: Vec<RepeatRuns> = self
            .rules
            .iter()
            .map(|rule| rule.repeat_runs(tokens, exceptions))
            .collect();

        for anchor in 0..tokens.len() {
            for (index, rule) in self.rules.iter().enumerate() {
                let Some(end_token) = rule.match_at(tokens, anchor, exceptions, &runs[index]) else {
                    continue;
                };
                if !rule.context.holds(text, tokens, anchor, end_token) {
                    continue;
                }

                candidates.push(Match {
                    first_token: anchor,
                    end_token,
                    start: tokens[anchor].start,
                    end: tokens[end_token - 1].end,
                    category: rule.category,
                    rule_id: rule.id.clone(),
                    priority: rule.priority,
                    rule_index: index,
                    displaced: Vec::new(),
                });
            }
        }

        candidates
    }
}
