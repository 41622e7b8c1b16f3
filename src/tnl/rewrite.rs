//! TNL 改写引擎
//!
//! 根据消歧后的匹配和规则的改写方式生成替换文本。
//! 纯函数：不修改发言、token 或例外表；失败时返回 `RewriteError`，由调用方原样保留。

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::tnl::error::RewriteError;
use crate::tnl::numbers;
use crate::tnl::rules::{ExceptionTable, RewriteSpec};
use crate::tnl::tokenizer::{Token, TokenKind};
use crate::tnl::types::Match;

lazy_static! {
    /// 字母读音（逐字母拼读缩写时使用）
    static ref LETTER_NAMES: HashMap<char, &'static str> = {
        let names = [
            ('A', "Ay"), ('B', "Bee"), ('C', "See"), ('D', "Dee"), ('E', "E"),
            ('F', "Eff"), ('G', "Gee"), ('H', "Aitch"), ('I', "I"), ('J', "Jay"),
            ('K', "Kay"), ('L', "El"), ('M', "Em"), ('N', "En"), ('O', "O"),
            ('P', "Pee"), ('Q', "Cue"), ('R', "Are"), ('S', "Ess"), ('T', "Tee"),
            ('U', "You"), ('V', "Vee"), ('W', "Double you"), ('X', "Ex"), ('Y', "Why"),
            ('Z', "Zee"),
        ];
        names.into_iter().collect()
    };
}

/// 改写结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// 原样保留
    Keep,
    /// 删除
    Strip,
    /// 替换为给定文本
    Replace(String),
    /// 例外表中没有条目、按默认逐字母拼读的缩写
    Spelled(String),
    /// 需要再次规范化的内部文本（编辑性括号）
    Nested(String),
}

/// 逐字母拼读：BIA → "Bee I Ay"，U.S.C → "You Ess See"
///
/// 只拼读开头的大写字母（含点号）部分，其余部分原样接在后面：BIA's → "Bee I Ay's"
pub fn spell_letters(word: &str) -> Option<String> {
    let caps_end = word
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_uppercase() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(word.len());
    let (caps, rest) = word.split_at(caps_end);

    let letters: Vec<&str> = caps
        .chars()
        .filter(|c| *c != '.')
        .map(|c| LETTER_NAMES.get(&c).copied())
        .collect::<Option<Vec<_>>>()?;
    if letters.is_empty() {
        return None;
    }
    Some(format!("{}{}", letters.join(" "), rest))
}

/// token 是否为需要拼读的大写缩写
///
/// 撇号之前只能是大写字母和点号（BIA、U.S.C、FBI's）
fn is_capital_word(token: &Token<'_>) -> bool {
    token.kind == TokenKind::Word
        && token.text.starts_with(|c: char| c.is_ascii_uppercase())
        && token
            .text
            .chars()
            .take_while(|c| *c != '\'' && *c != '\u{2019}')
            .all(|c| c.is_ascii_uppercase() || c == '.')
}

/// 按 token 逐个改写，保留 token 之间的原始空白
///
/// `piece` 返回 `None` 表示该 token 不出现在输出中（缩写末尾的点号）
fn join_pieces<F>(text: &str, tokens: &[Token<'_>], mut piece: F) -> Result<String, RewriteError>
where
    F: FnMut(&Token<'_>) -> Result<Option<String>, RewriteError>,
{
    let mut out = String::new();
    let mut prev_end: Option<usize> = None;
    for token in tokens {
        let Some(rendered) = piece(token)? else {
            prev_end = Some(token.end);
            continue;
        };
        if let Some(prev_end) = prev_end {
            if !out.is_empty() {
                out.push_str(&text[prev_end..token.start]);
            }
        }
        out.push_str(&rendered);
        prev_end = Some(token.end);
    }
    Ok(out)
}

/// 缩写末尾、紧贴前一个 token 的点号不读
fn is_trailing_dot(tokens: &[Token<'_>], token: &Token<'_>) -> bool {
    token.kind == TokenKind::Punct
        && token.text == "."
        && tokens
            .iter()
            .position(|t| t.start == token.start)
            .and_then(|i| i.checked_sub(1))
            .map(|i| token.is_attached_to(&tokens[i]))
            .unwrap_or(false)
}

fn malformed(text: &str) -> RewriteError {
    RewriteError::MalformedNumeral(text.to_string())
}

/// 第一个数字 token
fn first_numeral<'t, 'a>(tokens: &'t [Token<'a>]) -> Result<&'t Token<'a>, RewriteError> {
    tokens
        .iter()
        .find(|t| t.kind == TokenKind::Numeral)
        .ok_or(RewriteError::MissingToken("numeral"))
}

/// 改写引擎
pub struct RewriteEngine<'r> {
    exceptions: &'r ExceptionTable,
}

impl<'r> RewriteEngine<'r> {
    pub fn new(exceptions: &'r ExceptionTable) -> Self {
        Self { exceptions }
    }

    /// 生成匹配的替换结果
    ///
    /// `tokens` 是整条发言的 token 序列，`text` 是发言原文
    pub fn rewrite(
        &self,
        spec: &RewriteSpec,
        m: &Match,
        text: &str,
        tokens: &[Token<'_>],
    ) -> Result<Rewrite, RewriteError> {
        let matched = tokens
            .get(m.first_token..m.end_token)
            .filter(|t| !t.is_empty())
            .ok_or(RewriteError::MissingToken("match"))?;
        let surface = &text[m.start..m.end];

        let rewrite = match spec {
            RewriteSpec::Keep => Rewrite::Keep,
            RewriteSpec::Strip => Rewrite::Strip,
            RewriteSpec::Literal { text } => Rewrite::Replace(text.clone()),
            RewriteSpec::Lookup { table } => self.lookup(table, surface, matched),
            RewriteSpec::Exception => match self.exceptions.get(surface) {
                Some(pronunciation) => Rewrite::Replace(pronunciation.to_string()),
                None => Rewrite::Keep,
            },
            RewriteSpec::Acronym => self.acronym(surface, text, matched)?,
            RewriteSpec::Statute => Rewrite::Replace(self.statute(text, matched)?),
            RewriteSpec::Date => Rewrite::Replace(date(text, matched)?),
            RewriteSpec::Editorial => editorial(surface),
            RewriteSpec::Decade => Rewrite::Replace(decade(matched)?),
            RewriteSpec::Currency => {
                let amount = first_numeral(matched)?;
                let magnitude = matched
                    .iter()
                    .skip_while(|t| t.start != amount.start)
                    .nth(1)
                    .filter(|t| t.kind == TokenKind::Word)
                    .map(|t| t.text);
                let words = numbers::currency(amount.text, magnitude)
                    .ok_or_else(|| malformed(amount.text))?;
                Rewrite::Replace(words)
            }
            _ => {
                // 其余都是单个数字 token 的转换
                let numeral = first_numeral(matched).or_else(|_| {
                    matched
                        .first()
                        .ok_or(RewriteError::MissingToken("numeral"))
                })?;
                let value = numeral.text;
                let words = match spec {
                    RewriteSpec::Cardinal => numbers::speak_number(value),
                    RewriteSpec::Year => numbers::parse_integer(value).and_then(numbers::year),
                    RewriteSpec::DigitGroups => digit_groups_with_suffix(value),
                    RewriteSpec::Docket => numbers::docket(value),
                    RewriteSpec::Range => numbers::range(value),
                    RewriteSpec::Percentage => numbers::percentage(value),
                    RewriteSpec::LeadingDecimal => numbers::leading_decimal(value),
                    RewriteSpec::Ordinal => numbers::numeric_ordinal(value),
                    RewriteSpec::RomanCardinal => {
                        numbers::roman_value(value).and_then(numbers::cardinal)
                    }
                    RewriteSpec::RomanOrdinal => {
                        numbers::roman_value(value).and_then(numbers::ordinal)
                    }
                    _ => None,
                };
                // 只替换数字本身，匹配中的其他 token 原样保留
                let words = words.ok_or_else(|| malformed(value))?;
                Rewrite::Replace(splice(text, m, numeral, &words))
            }
        };
        Ok(rewrite)
    }

    /// 查表：先用完整原文，再去掉末尾点号，最后用首个 token
    fn lookup(
        &self,
        table: &std::collections::BTreeMap<String, String>,
        surface: &str,
        matched: &[Token<'_>],
    ) -> Rewrite {
        let folded = surface.split_whitespace().collect::<Vec<_>>().join(" ");
        let candidates = [
            folded.as_str(),
            folded.trim_end_matches('.'),
            matched.first().map(|t| t.text).unwrap_or_default(),
        ];
        candidates
            .iter()
            .find_map(|key| table.get(*key))
            .map(|v| Rewrite::Replace(v.clone()))
            .unwrap_or(Rewrite::Keep)
    }

    /// 缩写：例外表优先，否则大写部分逐字母拼读，其余 token 原样保留
    fn acronym(&self, surface: &str, text: &str, matched: &[Token<'_>]) -> Result<Rewrite, RewriteError> {
        let key = surface.trim_end_matches('.');
        if let Some(pronunciation) = self
            .exceptions
            .get(surface)
            .or_else(|| self.exceptions.get(key))
        {
            return Ok(Rewrite::Replace(pronunciation.to_string()));
        }

        let spelled = join_pieces(text, matched, |token| {
            if is_trailing_dot(matched, token) {
                return Ok(None);
            }
            if is_capital_word(token) {
                let spelled = spell_letters(token.text).ok_or(RewriteError::MissingToken("letters"))?;
                return Ok(Some(spelled));
            }
            Ok(Some(token.text.to_string()))
        })?;
        Ok(Rewrite::Spelled(spelled))
    }

    /// 法典引用：数字读基数，大写缩写逐字母拼读，其余原样
    ///
    /// 21 U.S.C. → "twenty one You Ess See"，Title 42 → "Title forty two"
    fn statute(&self, text: &str, matched: &[Token<'_>]) -> Result<String, RewriteError> {
        join_pieces(text, matched, |token| {
            if is_trailing_dot(matched, token) {
                return Ok(None);
            }
            match token.kind {
                TokenKind::Numeral => numbers::speak_number(token.text)
                    .map(Some)
                    .ok_or_else(|| malformed(token.text)),
                TokenKind::Word if is_capital_word(token) => match self.exceptions.get(token.text) {
                    Some(p) => Ok(Some(p.to_string())),
                    None => Ok(spell_letters(token.text)),
                },
                _ => Ok(Some(token.text.to_string())),
            }
        })
    }
}

/// 日期：January 5, 1983 → "January fifth, nineteen eighty three"
///
/// 一到两位（可带序数后缀）的数字是日，四位数字是年份
fn date(text: &str, matched: &[Token<'_>]) -> Result<String, RewriteError> {
    join_pieces(text, matched, |token| {
        if token.kind != TokenKind::Numeral {
            return Ok(Some(token.text.to_string()));
        }
        let value = token.text;
        let digits = value.trim_end_matches(|c: char| c.is_ascii_alphabetic());
        let words = if digits.len() == 4 {
            numbers::parse_integer(digits).and_then(numbers::year)
        } else if digits.len() < value.len() {
            numbers::numeric_ordinal(value)
        } else {
            numbers::parse_integer(digits)
                .filter(|day| (1..=31).contains(day))
                .and_then(numbers::ordinal)
        };
        words.map(Some).ok_or_else(|| malformed(value))
    })
}

/// 把匹配原文中的数字 token 替换为读法，其余部分保持不变
fn splice(text: &str, m: &Match, numeral: &Token<'_>, words: &str) -> String {
    format!(
        "{}{}{}",
        &text[m.start..numeral.start],
        words,
        &text[numeral.end..m.end]
    )
}

/// 逐组读法，字母后缀逐字母拼读：802 → "eight oh two"，1983a → "nineteen eighty three Ay"
fn digit_groups_with_suffix(value: &str) -> Option<String> {
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, suffix) = value.split_at(split);
    let words = numbers::digit_groups(digits)?;
    if suffix.is_empty() {
        return Some(words);
    }
    Some(format!("{} {}", words, spell_letters(&suffix.to_ascii_uppercase())?))
}

/// 年代：1980s → "nineteen eighties"，'80s → "eighties"
fn decade(matched: &[Token<'_>]) -> Result<String, RewriteError> {
    let numeral = first_numeral(matched)?;
    let digits = numeral
        .text
        .trim_end_matches(['s', 'S'])
        .trim_end_matches(['\'', '\u{2019}']);
    numbers::parse_integer(digits)
        .and_then(numbers::decade)
        .ok_or_else(|| malformed(numeral.text))
}

/// 编辑性括号 `[= X]`：去掉括号标记，内部文本交给调用方再次规范化
fn editorial(surface: &str) -> Rewrite {
    let inner = surface
        .strip_prefix("[=")
        .and_then(|s| s.strip_suffix(']'))
        .map(str::trim);
    match inner {
        Some("") => Rewrite::Strip,
        Some(inner) => Rewrite::Nested(inner.to_string()),
        None => Rewrite::Keep,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tnl::tokenizer::Tokenizer;
    use crate::tnl::types::Category;

    /// 覆盖 tokens[first..end] 的匹配
    fn span(tokens: &[Token<'_>], first: usize, end: usize) -> Match {
        Match {
            first_token: first,
            end_token: end,
            start: tokens[first].start,
            end: tokens[end - 1].end,
            category: Category::Unclassified,
            rule_id: "test".to_string(),
            priority: 0,
            rule_index: 0,
            displaced: Vec::new(),
        }
    }

    fn run(spec: RewriteSpec, text: &str, first: usize, end: usize) -> Result<Rewrite, RewriteError> {
        let exceptions = ExceptionTable::from_json(r#"{"WOS": "Woes", "NASA": "Nasa"}"#).unwrap();
        let tokens = Tokenizer::tokenize(text);
        RewriteEngine::new(&exceptions).rewrite(&spec, &span(&tokens, first, end), text, &tokens)
    }

    fn replaced(spec: RewriteSpec, text: &str, first: usize, end: usize) -> String {
        match run(spec, text, first, end).unwrap() {
            Rewrite::Replace(s) | Rewrite::Spelled(s) => s,
            other => panic!("unexpected rewrite: {:?}", other),
        }
    }

    #[test]
    fn test_spell_letters() {
        assert_eq!(spell_letters("BIA").as_deref(), Some("Bee I Ay"));
        assert_eq!(spell_letters("U.S.C").as_deref(), Some("You Ess See"));
        assert_eq!(spell_letters("FBI's").as_deref(), Some("Eff Bee I's"));
        assert_eq!(spell_letters("W").as_deref(), Some("Double you"));
        assert!(spell_letters("lower").is_none());
    }

    #[test]
    fn test_numeric_rewrites() {
        assert_eq!(replaced(RewriteSpec::Docket, "21-1164", 0, 1), "twenty one eleven sixty four");
        assert_eq!(replaced(RewriteSpec::DigitGroups, "802", 0, 1), "eight oh two");
        assert_eq!(replaced(RewriteSpec::Year, "1983", 0, 1), "nineteen eighty three");
        assert_eq!(replaced(RewriteSpec::Range, "9-0", 0, 1), "nine to zero");
        assert_eq!(replaced(RewriteSpec::Cardinal, "94", 0, 1), "ninety four");
        assert_eq!(replaced(RewriteSpec::Percentage, "50%", 0, 1), "fifty percent");
        assert_eq!(replaced(RewriteSpec::LeadingDecimal, ".66", 0, 1), "point six six");
        assert_eq!(replaced(RewriteSpec::Ordinal, "22nd", 0, 1), "twenty second");
        assert_eq!(replaced(RewriteSpec::RomanOrdinal, "XIV", 0, 1), "fourteenth");
        assert_eq!(replaced(RewriteSpec::RomanCardinal, "VII", 0, 1), "seven");
    }

    #[test]
    fn test_currency_with_magnitude() {
        assert_eq!(replaced(RewriteSpec::Currency, "$40,000", 0, 1), "forty thousand dollars");
        assert_eq!(replaced(RewriteSpec::Currency, "$3 million", 0, 2), "three million dollars");
    }

    #[test]
    fn test_decade_forms() {
        assert_eq!(replaced(RewriteSpec::Decade, "1980s", 0, 1), "nineteen eighties");
        assert_eq!(replaced(RewriteSpec::Decade, "'80s", 0, 2), "eighties");
    }

    #[test]
    fn test_malformed_numeral_is_error() {
        assert_eq!(
            run(RewriteSpec::Docket, "1-2-3x", 0, 1),
            Err(RewriteError::MalformedNumeral("1-2-3x".to_string()))
        );
        assert!(run(RewriteSpec::Ordinal, "2th", 0, 1).is_err());
    }

    #[test]
    fn test_acronym_exception_takes_precedence() {
        assert_eq!(run(RewriteSpec::Acronym, "WOS", 0, 1), Ok(Rewrite::Replace("Woes".to_string())));
        assert_eq!(
            run(RewriteSpec::Acronym, "BIA", 0, 1),
            Ok(Rewrite::Spelled("Bee I Ay".to_string()))
        );
    }

    #[test]
    fn test_acronym_keeps_lowercase_parts_and_gaps() {
        assert_eq!(replaced(RewriteSpec::Acronym, "V-chip", 0, 3), "Vee-chip");
        assert_eq!(replaced(RewriteSpec::Acronym, "U.S.", 0, 2), "You Ess");
    }

    #[test]
    fn test_statute_citation() {
        assert_eq!(replaced(RewriteSpec::Statute, "21 U.S.C.", 0, 3), "twenty one You Ess See");
        assert_eq!(replaced(RewriteSpec::Statute, "Title 42", 0, 2), "Title forty two");
    }

    #[test]
    fn test_lookup_and_literal() {
        let table = [("Mr".to_string(), "Mister".to_string())].into_iter().collect();
        assert_eq!(replaced(RewriteSpec::Lookup { table }, "Mr.", 0, 2), "Mister");
        let table = Default::default();
        assert_eq!(run(RewriteSpec::Lookup { table }, "Mr.", 0, 2), Ok(Rewrite::Keep));
        assert_eq!(
            replaced(RewriteSpec::Literal { text: "Number".to_string() }, "No.", 0, 2),
            "Number"
        );
    }

    #[test]
    fn test_editorial_bracket() {
        assert_eq!(
            run(RewriteSpec::Editorial, "[= 21-1164]", 0, 1),
            Ok(Rewrite::Nested("21-1164".to_string()))
        );
        assert_eq!(run(RewriteSpec::Editorial, "[= ]", 0, 1), Ok(Rewrite::Strip));
    }

    #[test]
    fn test_date_reads_day_as_ordinal() {
        assert_eq!(
            replaced(RewriteSpec::Date, "January 5, 1983", 0, 4),
            "January fifth, nineteen eighty three"
        );
        assert_eq!(replaced(RewriteSpec::Date, "March 22nd", 0, 2), "March twenty second");
        assert!(run(RewriteSpec::Date, "June 40", 0, 2).is_err());
    }

    #[test]
    fn test_number_inside_multi_token_match_is_spliced() {
        // 只有数字被替换，规则匹配到的其余 token 原样保留
        assert_eq!(replaced(RewriteSpec::Cardinal, "25 years", 0, 2), "twenty five years");
    }
}
