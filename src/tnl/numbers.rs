//! TNL 数字读法
//!
//! 基数、序数、年份式读法、逐组读法（案卷号/法条号）、金额、百分比、罗马数字。
//! 输出全部为小写英文单词，以单个空格分隔，不使用连字符和 "and"。
//! 无法解析的输入返回 `None`，由调用方决定原样保留。

const ONES: [&str; 20] = [
    "zero",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

const SCALES: [&str; 5] = ["", "thousand", "million", "billion", "trillion"];

/// 支持的最大值（千万亿以下）
const MAX_CARDINAL: u64 = 999_999_999_999_999;

/// 年份读法的合理范围
pub const YEAR_RANGE: std::ops::RangeInclusive<u64> = 1000..=2100;

fn below_hundred(n: u64, out: &mut Vec<&'static str>) {
    if n < 20 {
        out.push(ONES[n as usize]);
    } else {
        out.push(TENS[(n / 10) as usize]);
        if n % 10 != 0 {
            out.push(ONES[(n % 10) as usize]);
        }
    }
}

fn below_thousand(n: u64, out: &mut Vec<&'static str>) {
    if n >= 100 {
        out.push(ONES[(n / 100) as usize]);
        out.push("hundred");
        if n % 100 != 0 {
            below_hundred(n % 100, out);
        }
    } else {
        below_hundred(n, out);
    }
}

/// 基数读法：94 → "ninety four"
pub fn cardinal(n: u64) -> Option<String> {
    if n > MAX_CARDINAL {
        return None;
    }
    if n == 0 {
        return Some("zero".to_string());
    }

    let mut groups = Vec::new();
    let mut rest = n;
    while rest > 0 {
        groups.push(rest % 1000);
        rest /= 1000;
    }

    let mut words = Vec::new();
    for (scale, group) in groups.iter().enumerate().rev() {
        if *group == 0 {
            continue;
        }
        below_thousand(*group, &mut words);
        if !SCALES[scale].is_empty() {
            words.push(SCALES[scale]);
        }
    }
    Some(words.join(" "))
}

/// 单个数字的读法
pub fn digit_name(ch: char) -> Option<&'static str> {
    ch.to_digit(10).map(|d| ONES[d as usize])
}

/// 逐位读数字：66 → "six six"
pub fn spell_digits(digits: &str) -> Option<String> {
    let words: Option<Vec<&str>> = digits.chars().map(digit_name).collect();
    words.filter(|w| !w.is_empty()).map(|w| w.join(" "))
}

/// 解析纯数字（允许千分位逗号）
pub fn parse_integer(text: &str) -> Option<u64> {
    let mut groups = text.split(',');
    let first = groups.next()?;
    if first.is_empty() || !first.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut digits = first.to_string();
    for group in groups {
        // 千分位：首组 1-3 位，其余每组恰好 3 位
        if first.len() > 3 || group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.push_str(group);
    }
    digits.parse().ok()
}

/// 数字读法（整数或小数）：1,000 → "one thousand"，3.5 → "three point five"
pub fn speak_number(text: &str) -> Option<String> {
    match text.split_once('.') {
        Some((whole, fraction)) => {
            let whole_words = if whole.is_empty() {
                "zero".to_string()
            } else {
                cardinal(parse_integer(whole)?)?
            };
            Some(format!("{} point {}", whole_words, spell_digits(fraction)?))
        }
        None => cardinal(parse_integer(text)?),
    }
}

/// 基数词变为序数词（只改最后一个词）
fn ordinalize(words: &str) -> String {
    let (head, last) = match words.rsplit_once(' ') {
        Some((head, last)) => (Some(head), last),
        None => (None, words),
    };
    let last = match last {
        "one" => "first".to_string(),
        "two" => "second".to_string(),
        "three" => "third".to_string(),
        "five" => "fifth".to_string(),
        "eight" => "eighth".to_string(),
        "nine" => "ninth".to_string(),
        "twelve" => "twelfth".to_string(),
        w if w.ends_with('y') => format!("{}ieth", &w[..w.len() - 1]),
        w => format!("{}th", w),
    };
    match head {
        Some(head) => format!("{} {}", head, last),
        None => last,
    }
}

/// 序数读法：22 → "twenty second"
pub fn ordinal(n: u64) -> Option<String> {
    cardinal(n).map(|w| ordinalize(&w))
}

/// 数字序数（2nd、22nd、101st）的读法
///
/// 后缀必须与数字相符（2th 不算）
pub fn numeric_ordinal(text: &str) -> Option<String> {
    let split = text.find(|c: char| !c.is_ascii_digit())?;
    let (digits, suffix) = text.split_at(split);
    let n = parse_integer(digits)?;
    let expected = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    if !suffix.eq_ignore_ascii_case(expected) {
        return None;
    }
    ordinal(n)
}

/// 两位数组的读法：05 → "oh five"，00 → "hundred"
fn pair_words(pair: &str, out: &mut Vec<String>) -> Option<()> {
    let value: u64 = pair.parse().ok()?;
    if value == 0 {
        out.push("hundred".to_string());
    } else if pair.starts_with('0') {
        out.push("oh".to_string());
        out.push(ONES[value as usize].to_string());
    } else {
        out.push(cardinal(value)?);
    }
    Some(())
}

/// 逐组读法（法条号、案卷号后半段）
///
/// 奇数位时首位单读，其余两位一组：802 → "eight oh two"，3582 → "thirty five eighty two"，
/// 整千的数按基数读：2000 → "two thousand"
pub fn digit_groups(digits: &str) -> Option<String> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: u64 = digits.parse().ok()?;
    if digits.len() <= 2 || (value % 1000 == 0 && !digits.starts_with('0')) {
        return cardinal(value);
    }

    let mut words = Vec::new();
    let mut rest = digits;
    if rest.len() % 2 == 1 {
        let (head, tail) = rest.split_at(1);
        words.push(digit_name(head.chars().next()?)?.to_string());
        rest = tail;
    }
    while !rest.is_empty() {
        let (pair, tail) = rest.split_at(2);
        pair_words(pair, &mut words)?;
        rest = tail;
    }
    Some(words.join(" "))
}

/// 年份读法：2010 → "twenty ten"，1215 → "twelve fifteen"，2005 → "two thousand five"
pub fn year(n: u64) -> Option<String> {
    if !(1000..=9999).contains(&n) {
        return cardinal(n);
    }
    let (high, low) = (n / 100, n % 100);
    if high % 10 == 0 && low < 10 {
        // 1000、2000、2001..2009
        return cardinal(n);
    }
    let mut words = vec![cardinal(high)?];
    if low == 0 {
        words.push("hundred".to_string());
    } else if low < 10 {
        words.push("oh".to_string());
        words.push(ONES[low as usize].to_string());
    } else {
        words.push(cardinal(low)?);
    }
    Some(words.join(" "))
}

fn pluralize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        format!("{}ies", stem)
    } else if word.ends_with('x') {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// 年代读法：1980 → "nineteen eighties"，80 → "eighties"
pub fn decade(n: u64) -> Option<String> {
    if n % 10 != 0 {
        return None;
    }
    let words = if n < 100 { cardinal(n)? } else { year(n)? };
    Some(match words.rsplit_once(' ') {
        Some((head, last)) => format!("{} {}", head, pluralize(last)),
        None => pluralize(&words),
    })
}

/// 按第一个连字符（含 en dash）拆分
pub fn split_dash(text: &str) -> Option<(&str, &str)> {
    let idx = text.find(['-', '\u{2013}'])?;
    let dash_len = text[idx..].chars().next()?.len_utf8();
    Some((&text[..idx], &text[idx + dash_len..]))
}

/// 案卷号读法：前段（开庭期）按基数读，后段逐组读
///
/// 21-1164 → "twenty one eleven sixty four"，补零的开庭期逐位读：01-1234 → "oh one twelve thirty four"
pub fn docket(text: &str) -> Option<String> {
    let (term, number) = split_dash(text)?;
    let term_words = match term.strip_prefix('0') {
        Some(rest) if rest.len() == 1 => {
            let digit = rest.chars().next()?;
            let word = if digit == '0' { "oh" } else { digit_name(digit)? };
            format!("oh {}", word)
        }
        _ => cardinal(parse_integer(term)?)?,
    };
    let number_words = digit_groups(number)?;
    Some(format!("{} {}", term_words, number_words))
}

fn is_year_like(text: &str) -> Option<u64> {
    if text.len() != 4 {
        return None;
    }
    parse_integer(text).filter(|n| YEAR_RANGE.contains(n))
}

/// 区间/票数读法：9-0 → "nine to zero"，2010–2015 → "twenty ten to twenty fifteen"
pub fn range(text: &str) -> Option<String> {
    let (left, right) = split_dash(text)?;
    if let (Some(a), Some(b)) = (is_year_like(left), is_year_like(right)) {
        return Some(format!("{} to {}", year(a)?, year(b)?));
    }
    Some(format!("{} to {}", speak_number(left)?, speak_number(right)?))
}

/// 金额读法：$40,000 → "forty thousand dollars"，$3.50 → "three dollars and fifty cents"
///
/// `magnitude` 为紧随其后的量级词（million、billion），出现时放在 dollars 之前
pub fn currency(text: &str, magnitude: Option<&str>) -> Option<String> {
    let amount = text.strip_prefix('$')?;
    if let Some(magnitude) = magnitude {
        return Some(format!(
            "{} {} dollars",
            speak_number(amount)?,
            magnitude.to_lowercase()
        ));
    }

    let (whole, cents) = match amount.split_once('.') {
        Some((whole, cents)) if cents.len() == 2 => (whole, Some(cents)),
        Some(_) => return Some(format!("{} dollars", speak_number(amount)?)),
        None => (amount, None),
    };
    let dollars = parse_integer(whole)?;
    let cents = match cents {
        Some(c) => parse_integer(c)?,
        None => 0,
    };

    let dollar_words = format!(
        "{} {}",
        cardinal(dollars)?,
        if dollars == 1 { "dollar" } else { "dollars" }
    );
    if cents == 0 {
        return Some(dollar_words);
    }
    let cent_words = format!(
        "{} {}",
        cardinal(cents)?,
        if cents == 1 { "cent" } else { "cents" }
    );
    if dollars == 0 {
        Some(cent_words)
    } else {
        Some(format!("{} and {}", dollar_words, cent_words))
    }
}

/// 百分比读法：50% → "fifty percent"
pub fn percentage(text: &str) -> Option<String> {
    let number = text.strip_suffix('%')?;
    Some(format!("{} percent", speak_number(number)?))
}

/// 前导小数点读法：.66 → "point six six"
pub fn leading_decimal(text: &str) -> Option<String> {
    let digits = text.strip_prefix('.')?;
    Some(format!("point {}", spell_digits(digits)?))
}

/// 罗马数字求值（只接受规范写法）
pub fn roman_value(text: &str) -> Option<u64> {
    if text.is_empty() {
        return None;
    }
    let mut total: u64 = 0;
    let mut prev: u64 = 0;
    for ch in text.chars().rev() {
        let value = match ch.to_ascii_uppercase() {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            'D' => 500,
            'M' => 1000,
            _ => return None,
        };
        if value < prev {
            total = total.checked_sub(value)?;
        } else {
            total += value;
            prev = value;
        }
    }
    if total == 0 || to_roman(total)?.as_str() != text.to_ascii_uppercase() {
        return None;
    }
    Some(total)
}

fn to_roman(mut n: u64) -> Option<String> {
    if n == 0 || n > 3999 {
        return None;
    }
    const TABLE: [(u64, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, symbol) in TABLE {
        while n >= value {
            out.push_str(symbol);
            n -= value;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinal() {
        assert_eq!(cardinal(0).unwrap(), "zero");
        assert_eq!(cardinal(94).unwrap(), "ninety four");
        assert_eq!(cardinal(115).unwrap(), "one hundred fifteen");
        assert_eq!(cardinal(40_000).unwrap(), "forty thousand");
        assert_eq!(cardinal(1_000_001).unwrap(), "one million one");
        assert!(cardinal(u64::MAX).is_none());
    }

    #[test]
    fn test_speak_number() {
        assert_eq!(speak_number("1,000").unwrap(), "one thousand");
        assert_eq!(speak_number("3.5").unwrap(), "three point five");
        assert!(speak_number("1,,0").is_none());
        assert!(speak_number("12a").is_none());
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(ordinal(5).unwrap(), "fifth");
        assert_eq!(ordinal(20).unwrap(), "twentieth");
        assert_eq!(numeric_ordinal("2nd").unwrap(), "second");
        assert_eq!(numeric_ordinal("22nd").unwrap(), "twenty second");
        assert_eq!(numeric_ordinal("11th").unwrap(), "eleventh");
        assert_eq!(numeric_ordinal("101st").unwrap(), "one hundred first");
        assert!(numeric_ordinal("2th").is_none());
    }

    #[test]
    fn test_digit_groups() {
        assert_eq!(digit_groups("802").unwrap(), "eight oh two");
        assert_eq!(digit_groups("3582").unwrap(), "thirty five eighty two");
        assert_eq!(digit_groups("1164").unwrap(), "eleven sixty four");
        assert_eq!(digit_groups("511").unwrap(), "five eleven");
        assert_eq!(digit_groups("1100").unwrap(), "eleven hundred");
        assert_eq!(digit_groups("2000").unwrap(), "two thousand");
        assert_eq!(digit_groups("18").unwrap(), "eighteen");
        assert!(digit_groups("8O2").is_none());
    }

    #[test]
    fn test_year() {
        assert_eq!(year(2010).unwrap(), "twenty ten");
        assert_eq!(year(1215).unwrap(), "twelve fifteen");
        assert_eq!(year(1983).unwrap(), "nineteen eighty three");
        assert_eq!(year(1905).unwrap(), "nineteen oh five");
        assert_eq!(year(1900).unwrap(), "nineteen hundred");
        assert_eq!(year(2000).unwrap(), "two thousand");
        assert_eq!(year(2005).unwrap(), "two thousand five");
    }

    #[test]
    fn test_decade() {
        assert_eq!(decade(1980).unwrap(), "nineteen eighties");
        assert_eq!(decade(1930).unwrap(), "nineteen thirties");
        assert_eq!(decade(1900).unwrap(), "nineteen hundreds");
        assert_eq!(decade(2010).unwrap(), "twenty tens");
        assert_eq!(decade(80).unwrap(), "eighties");
        assert!(decade(1985).is_none());
    }

    #[test]
    fn test_docket() {
        assert_eq!(docket("21-1164").unwrap(), "twenty one eleven sixty four");
        assert_eq!(docket("96-511").unwrap(), "ninety six five eleven");
        assert_eq!(docket("01-1234").unwrap(), "oh one twelve thirty four");
        assert_eq!(docket("00-949").unwrap(), "oh oh nine forty nine");
        assert!(docket("21").is_none());
        assert!(docket("0x-12").is_none());
    }

    #[test]
    fn test_range() {
        assert_eq!(range("9-0").unwrap(), "nine to zero");
        assert_eq!(range("10\u{2013}12").unwrap(), "ten to twelve");
        assert_eq!(range("2010\u{2013}2015").unwrap(), "twenty ten to twenty fifteen");
    }

    #[test]
    fn test_currency() {
        assert_eq!(currency("$40,000", None).unwrap(), "forty thousand dollars");
        assert_eq!(currency("$1", None).unwrap(), "one dollar");
        assert_eq!(currency("$3.50", None).unwrap(), "three dollars and fifty cents");
        assert_eq!(currency("$0.25", None).unwrap(), "twenty five cents");
        assert_eq!(
            currency("$1.5", Some("million")).unwrap(),
            "one point five million dollars"
        );
        assert!(currency("40", None).is_none());
    }

    #[test]
    fn test_percentage_and_decimal() {
        assert_eq!(percentage("50%").unwrap(), "fifty percent");
        assert_eq!(leading_decimal(".66").unwrap(), "point six six");
        assert_eq!(leading_decimal(".5").unwrap(), "point five");
    }

    #[test]
    fn test_roman_value() {
        assert_eq!(roman_value("VII"), Some(7));
        assert_eq!(roman_value("IV"), Some(4));
        assert_eq!(roman_value("XIV"), Some(14));
        assert_eq!(roman_value("IIII"), None);
        assert_eq!(roman_value("BIA"), None);
    }
}
