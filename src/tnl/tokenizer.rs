//! TNL 分词器
//!
//! 将发言文本切分为：单词、复合数字、标点、括号片段、符号。
//! 空白不产生 token，token 之间的空白由偏移量隐式保留。

use serde::{Deserialize, Serialize};

/// Token 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// 字母开头的单词（可含内部的 ' . 和数字，如 O'Brien、U.S.C）
    Word,
    /// 复合数字（21-1164、$40,000、50%、.66、1980s、2nd）
    Numeral,
    /// 标点（. , ; : ! ? -- ... 等）
    Punct,
    /// 完整的括号片段（[Inaudible]、(Laughter.)、{note}）
    Bracketed,
    /// 其他符号（§ ¶ & 等）
    Symbol,
}

/// Token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub kind: TokenKind,
    /// 在原文中的起始字节偏移
    pub start: usize,
    /// 在原文中的结束字节偏移（不含）
    pub end: usize,
}

impl Token<'_> {
    /// 与前一个 token 之间没有空白
    pub fn is_attached_to(&self, prev: &Token<'_>) -> bool {
        prev.end == self.start
    }
}

/// 分词器
pub struct Tokenizer;

impl Tokenizer {
    /// 分词
    ///
    /// 按顺序返回全部 token
    pub fn tokenize(text: &str) -> Vec<Token<'_>> {
        Self::tokens(text).collect()
    }

    /// 惰性 token 序列
    ///
    /// 每次调用都从头开始，不保留任何外部状态
    pub fn tokens(text: &str) -> Tokens<'_> {
        Tokens { text, pos: 0 }
    }
}

/// 惰性 token 迭代器
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let text = self.text;

        // 跳过空白
        while let Some(ch) = text[self.pos..].chars().next() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }

        let start = self.pos;
        let ch = text[start..].chars().next()?;
        let prev = text[..start].chars().next_back();

        let (end, kind) = if let Some(end) = scan_bracketed(text, start, ch) {
            (end, TokenKind::Bracketed)
        } else if starts_numeral(text, start, ch, prev) {
            (scan_numeral(text, start), TokenKind::Numeral)
        } else if ch.is_alphabetic() {
            (scan_word(text, start), TokenKind::Word)
        } else if is_punct(ch) {
            (scan_punct(text, start, ch), TokenKind::Punct)
        } else {
            (scan_symbol(text, start, ch), TokenKind::Symbol)
        };

        self.pos = end;
        Some(Token {
            text: &text[start..end],
            kind,
            start,
            end,
        })
    }
}

fn char_at(text: &str, idx: usize) -> Option<char> {
    text.get(idx..).and_then(|s| s.chars().next())
}

fn is_dash(ch: char) -> bool {
    ch == '-' || ch == '\u{2013}'
}

fn is_punct(ch: char) -> bool {
    matches!(
        ch,
        '.' | ',' | ';' | ':' | '!' | '?' | '"' | '\'' | '-' | '\u{2013}' | '\u{2014}' | '\u{2026}'
            | '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}' | ')' | ']' | '}' | '(' | '[' | '{'
    )
}

/// 闭合括号
fn closing_bracket(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

/// 扫描完整括号片段
///
/// 同一行内找到对应闭括号且中间没有同类开括号时，整体作为一个 token
fn scan_bracketed(text: &str, start: usize, open: char) -> Option<usize> {
    let close = closing_bracket(open)?;
    let inner_start = start + open.len_utf8();
    for (offset, ch) in text[inner_start..].char_indices() {
        if ch == close {
            // 空括号不算片段
            if offset == 0 {
                return None;
            }
            return Some(inner_start + offset + ch.len_utf8());
        }
        if ch == open || ch == '\n' {
            return None;
        }
    }
    None
}

/// 数字开头：数字、$数字、以及前面不是数字的 .数字（.66）
fn starts_numeral(text: &str, start: usize, ch: char, prev: Option<char>) -> bool {
    if ch.is_ascii_digit() {
        return true;
    }
    let next = char_at(text, start + ch.len_utf8());
    let next_is_digit = next.map(|c| c.is_ascii_digit()).unwrap_or(false);
    match ch {
        '$' => next_is_digit,
        '.' => next_is_digit && !prev.map(|c| c.is_ascii_alphanumeric()).unwrap_or(false),
        _ => false,
    }
}

/// 扫描复合数字
///
/// 数字之间允许 , . - –（后面必须紧跟数字），结尾允许 % 与字母后缀（1980s、2nd）
fn scan_numeral(text: &str, start: usize) -> usize {
    let mut idx = start;
    // 前缀 $ 或 .
    if let Some(ch) = char_at(text, idx) {
        if ch == '$' || ch == '.' {
            idx += ch.len_utf8();
        }
    }

    while let Some(ch) = char_at(text, idx) {
        if ch.is_ascii_digit() {
            idx += 1;
            continue;
        }
        let joins_digits = (ch == ',' || ch == '.' || is_dash(ch))
            && char_at(text, idx + ch.len_utf8())
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false);
        if joins_digits {
            idx += ch.len_utf8();
            continue;
        }
        break;
    }

    if char_at(text, idx) == Some('%') {
        return idx + 1;
    }

    // 字母后缀最多两个字母（s、nd、th）；更长的字母串单独成词
    let suffix_start = idx;
    while let Some(ch) = char_at(text, idx) {
        if ch.is_ascii_alphabetic() {
            idx += 1;
        } else {
            break;
        }
    }
    if idx - suffix_start > 2 {
        return suffix_start;
    }
    idx
}

/// 扫描单词
///
/// 内部允许撇号和点号（后面必须紧跟字母），以及字母数字混排
fn scan_word(text: &str, start: usize) -> usize {
    let mut idx = start;
    while let Some(ch) = char_at(text, idx) {
        if ch.is_alphanumeric() {
            idx += ch.len_utf8();
            continue;
        }
        let joins_letters = matches!(ch, '\'' | '\u{2019}' | '.')
            && char_at(text, idx + ch.len_utf8())
                .map(|c| c.is_alphabetic())
                .unwrap_or(false);
        if joins_letters {
            idx += ch.len_utf8();
            continue;
        }
        break;
    }
    idx
}

/// 扫描标点：连续的 - 和 . 合并为一个 token（-- 与 ...）
fn scan_punct(text: &str, start: usize, ch: char) -> usize {
    let mut idx = start + ch.len_utf8();
    if ch == '-' || ch == '.' {
        while char_at(text, idx) == Some(ch) {
            idx += 1;
        }
    }
    idx
}

/// 扫描符号：连续的相同符号合并（§§）
fn scan_symbol(text: &str, start: usize, ch: char) -> usize {
    let mut idx = start + ch.len_utf8();
    while char_at(text, idx) == Some(ch) {
        idx += ch.len_utf8();
    }
    idx
}
