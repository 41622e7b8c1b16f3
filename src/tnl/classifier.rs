//! TNL 上下文分类与消歧
//!
//! 1. 上下文谓词：检查匹配区间之外的相邻 token
//! 2. 消歧：按（起始偏移, 优先级, -长度）排序后从左到右贪婪接受，重叠者丢弃
//!
//! 消歧只有这一个算法，新增歧义模式只需新增规则数据

use std::cmp::Reverse;

use regex::Regex;

use crate::tnl::error::RuleSetError;
use crate::tnl::rules::{ContextSpec, ExceptionTable, RuleSet};
use crate::tnl::tokenizer::{Token, Tokenizer};
use crate::tnl::types::Match;

/// 默认邻近窗口（token 数）
const DEFAULT_WINDOW: usize = 3;

/// 空白折叠 + 小写
fn fold(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 预处理后的短语：折叠文本 + 所占 token 数
#[derive(Debug)]
struct Phrase {
    folded: String,
    token_count: usize,
}

impl Phrase {
    fn new(phrase: &str) -> Option<Self> {
        let token_count = Tokenizer::tokens(phrase).count();
        (token_count > 0).then(|| Self {
            folded: fold(phrase),
            token_count,
        })
    }

    /// tokens[from..to] 的原文是否等于该短语
    fn matches(&self, text: &str, tokens: &[Token<'_>], from: usize, to: usize) -> bool {
        if from >= to || to > tokens.len() {
            return false;
        }
        fold(&text[tokens[from].start..tokens[to - 1].end]) == self.folded
    }

    fn precedes(&self, text: &str, tokens: &[Token<'_>], first: usize) -> bool {
        first >= self.token_count && self.matches(text, tokens, first - self.token_count, first)
    }

    fn follows(&self, text: &str, tokens: &[Token<'_>], end: usize) -> bool {
        self.matches(text, tokens, end, end + self.token_count)
    }
}

fn phrases(list: &[String]) -> Vec<Phrase> {
    list.iter().filter_map(|p| Phrase::new(p)).collect()
}

fn compile_regex(rule_id: &str, pattern: &Option<String>) -> Result<Option<Regex>, RuleSetError> {
    pattern
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| RuleSetError::regex(rule_id, e))
}

/// 编译后的上下文谓词
#[derive(Debug, Default)]
pub struct ContextPredicate {
    preceded_by: Vec<Phrase>,
    not_preceded_by: Vec<Phrase>,
    followed_by: Vec<Phrase>,
    not_followed_by: Vec<Phrase>,
    prev_token: Option<Regex>,
    not_prev_token: Option<Regex>,
    next_token: Option<Regex>,
    not_next_token: Option<Regex>,
    near: Vec<String>,
    not_near: Vec<String>,
    window: usize,
}

impl ContextPredicate {
    pub fn compile(rule_id: &str, spec: &ContextSpec) -> Result<Self, RuleSetError> {
        Ok(Self {
            preceded_by: phrases(&spec.preceded_by),
            not_preceded_by: phrases(&spec.not_preceded_by),
            followed_by: phrases(&spec.followed_by),
            not_followed_by: phrases(&spec.not_followed_by),
            prev_token: compile_regex(rule_id, &spec.prev_token)?,
            not_prev_token: compile_regex(rule_id, &spec.not_prev_token)?,
            next_token: compile_regex(rule_id, &spec.next_token)?,
            not_next_token: compile_regex(rule_id, &spec.not_next_token)?,
            near: spec.near.iter().map(|w| w.to_lowercase()).collect(),
            not_near: spec.not_near.iter().map(|w| w.to_lowercase()).collect(),
            window: spec.window.unwrap_or(DEFAULT_WINDOW),
        })
    }

    /// 匹配区间 tokens[first..end] 的上下文是否满足
    pub fn holds(&self, text: &str, tokens: &[Token<'_>], first: usize, end: usize) -> bool {
        if !self.preceded_by.is_empty()
            && !self.preceded_by.iter().any(|p| p.precedes(text, tokens, first))
        {
            return false;
        }
        if self.not_preceded_by.iter().any(|p| p.precedes(text, tokens, first)) {
            return false;
        }
        if !self.followed_by.is_empty()
            && !self.followed_by.iter().any(|p| p.follows(text, tokens, end))
        {
            return false;
        }
        if self.not_followed_by.iter().any(|p| p.follows(text, tokens, end)) {
            return false;
        }

        let prev = first.checked_sub(1).and_then(|i| tokens.get(i));
        let next = tokens.get(end);
        if !adjacent_holds(&self.prev_token, &self.not_prev_token, prev) {
            return false;
        }
        if !adjacent_holds(&self.next_token, &self.not_next_token, next) {
            return false;
        }

        if !self.near.is_empty() && !self.any_near(&self.near, tokens, first, end) {
            return false;
        }
        if !self.not_near.is_empty() && self.any_near(&self.not_near, tokens, first, end) {
            return false;
        }

        true
    }

    fn any_near(&self, words: &[String], tokens: &[Token<'_>], first: usize, end: usize) -> bool {
        let before = first.saturating_sub(self.window)..first;
        let after = end..(end + self.window).min(tokens.len());
        before
            .chain(after)
            .any(|i| words.iter().any(|w| w.eq_ignore_ascii_case(tokens[i].text)))
    }
}

fn adjacent_holds(required: &Option<Regex>, forbidden: &Option<Regex>, token: Option<&Token<'_>>) -> bool {
    if let Some(regex) = required {
        match token {
            Some(t) if regex.is_match(t.text) => {}
            _ => return false,
        }
    }
    if let (Some(regex), Some(t)) = (forbidden, token) {
        if regex.is_match(t.text) {
            return false;
        }
    }
    true
}

/// 消歧：返回从左到右、互不重叠的匹配序列
///
/// 排序键为（起始偏移, 优先级, -长度, 规则序号），与规则存储的迭代顺序无关。
/// 被拒绝的候选记录在胜出匹配的 `displaced` 中，供审计
pub fn resolve(mut candidates: Vec<Match>) -> Vec<Match> {
    candidates.sort_by_key(|m| (m.start, m.priority, Reverse(m.len()), m.rule_index, m.end));

    let mut accepted: Vec<Match> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate.is_empty() {
            continue;
        }
        match accepted.last_mut() {
            // 已接受的匹配互不重叠且有序，只需与最后一个比较
            Some(last) if candidate.start < last.end => {
                if !last.displaced.contains(&candidate.rule_id) && last.rule_id != candidate.rule_id {
                    last.displaced.push(candidate.rule_id);
                }
            }
            _ => accepted.push(candidate),
        }
    }

    if accepted.iter().any(|m| !m.displaced.is_empty()) {
        tracing::debug!(
            "TNL: 消歧完成，{} 个匹配中有 {} 个存在重叠候选",
            accepted.len(),
            accepted.iter().filter(|m| !m.displaced.is_empty()).count()
        );
    }
    accepted
}

/// 分类：候选收集 + 消歧
pub fn classify(rules: &RuleSet, text: &str, tokens: &[Token<'_>]) -> Vec<Match> {
    classify_with(rules, rules.exceptions(), text, tokens)
}

pub(crate) fn classify_with(
    rules: &RuleSet,
    exceptions: &ExceptionTable,
    text: &str,
    tokens: &[Token<'_>],
) -> Vec<Match> {
    resolve(rules.catalog().match_candidates(text, tokens, exceptions))
}
