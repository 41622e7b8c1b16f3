//! TNL 规则定义
//!
//! 规则集是外部声明式数据（JSON），加载一次后只读。
//! 每一轮规则迭代产生一个新的规则集版本，不修改任何全局状态。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::tnl::catalog::PatternCatalog;
use crate::tnl::error::RuleSetError;
use crate::tnl::tokenizer::TokenKind;
use crate::tnl::types::Category;

/// 内置规则集
const BUILTIN_RULES: &str = include_str!("../../rules/court_rules.json");

// ============================================================================
// 规则文件结构
// ============================================================================

/// 规则文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    /// 规则集版本（每一轮迭代一个版本）
    pub version: String,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// 例外表：书面形式 → 读音
    #[serde(default)]
    pub exceptions: BTreeMap<String, String>,
}

/// 单条规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    pub category: Category,
    /// 越小越先生效
    pub priority: i32,
    /// 按顺序匹配的 token 模式
    pub pattern: Vec<TokenPatternSpec>,
    /// 匹配区间之外的上下文条件
    #[serde(default)]
    pub context: ContextSpec,
    pub rewrite: RewriteSpec,
    /// 命中时输出人工复核诊断
    #[serde(default)]
    pub review: bool,
}

/// 重复方式（贪婪且不回溯）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repeat {
    #[default]
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

impl Repeat {
    /// 至少消耗一个 token
    pub fn is_required(&self) -> bool {
        matches!(self, Repeat::One | Repeat::OneOrMore)
    }
}

/// 单个 token 的匹配条件（所有给出的条件都必须满足）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenPatternSpec {
    /// token 文本正则
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// 字面量候选
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<String>,
    /// 排除的字面量（与 `any` 共用大小写设置）
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_any: Vec<String>,
    /// `any` / `not_any` / `prev_any` 是否区分大小写
    pub case_sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<TokenKind>,
    /// token 必须是例外表中的条目
    pub in_exceptions: bool,
    /// 与前一个已匹配 token 之间不能有空白
    pub attached: bool,
    /// 前一个 token 必须是其中之一
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prev_any: Vec<String>,
    /// 后一个 token 紧贴本 token 且匹配该正则（不消耗）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attached: Option<String>,
    /// 备选条件，至少满足一个（备选自身的 `repeat` 被忽略）
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<TokenPatternSpec>,
    pub repeat: Repeat,
}

/// 上下文条件
///
/// 短语条件与相邻 1..=N 个 token 的原文比较（空白折叠、不区分大小写）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preceded_by: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_preceded_by: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub followed_by: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_followed_by: Vec<String>,
    /// 紧邻前一个 token 的正则
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_prev_token: Option<String>,
    /// 紧邻后一个 token 的正则
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_next_token: Option<String>,
    /// 左右 `window` 个 token 内出现任一单词
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub near: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_near: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<usize>,
}

/// 改写方式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewriteSpec {
    /// 原样保留（审计/感知用）
    Keep,
    /// 删除（不出现在音频中的内容）
    Strip,
    /// 固定文本
    Literal { text: String },
    /// 以首个 token 文本查表，查不到则原样保留
    Lookup { table: BTreeMap<String, String> },
    Cardinal,
    Year,
    Decade,
    DigitGroups,
    Docket,
    Range,
    Currency,
    Percentage,
    LeadingDecimal,
    Ordinal,
    /// 逐字母拼读（例外表优先）
    Acronym,
    /// 例外表读音
    Exception,
    RomanCardinal,
    RomanOrdinal,
    /// 法典引用：数字读基数，缩写逐字母拼读
    Statute,
    /// 日期：日读序数，年份读年份，月份原样
    Date,
    /// [= X]：替换为 X 的规范化结果
    Editorial,
}

impl RuleFile {
    pub fn from_json(source: &str) -> Result<Self, RuleSetError> {
        serde_json::from_str(source).map_err(|e| RuleSetError::json("规则文件", e))
    }

    /// 结构校验（正则在编译目录时校验）
    pub fn validate(&self) -> Result<(), RuleSetError> {
        if self.version.trim().is_empty() {
            return Err(RuleSetError::MissingVersion);
        }
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(RuleSetError::DuplicateRule(rule.id.clone()));
            }
            if !rule.pattern.iter().any(|p| p.repeat.is_required()) {
                return Err(RuleSetError::EmptyPattern(rule.id.clone()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// 例外表
// ============================================================================

/// 例外表：覆盖默认读法的书面形式 → 读音映射
///
/// 键和值都做 NFC 归一化，查找时同样归一化
#[derive(Debug, Clone, Default)]
pub struct ExceptionTable {
    entries: HashMap<String, String>,
}

impl ExceptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        let mut table = Self::new();
        for (surface, pronunciation) in map {
            table.insert(&surface, &pronunciation);
        }
        table
    }

    /// 从扁平 JSON 对象解析
    pub fn from_json(source: &str) -> Result<Self, RuleSetError> {
        let map: BTreeMap<String, String> =
            serde_json::from_str(source).map_err(|e| RuleSetError::json("例外表", e))?;
        Ok(Self::from_map(map))
    }

    pub fn load(path: &Path) -> Result<Self, RuleSetError> {
        let content = std::fs::read_to_string(path).map_err(|e| RuleSetError::io(path, e))?;
        Self::from_json(&content)
    }

    /// 插入或覆盖条目（空白条目忽略）
    pub fn insert(&mut self, surface: &str, pronunciation: &str) {
        let surface = surface.trim();
        let pronunciation = pronunciation.trim();
        if surface.is_empty() || pronunciation.is_empty() {
            return;
        }
        self.entries
            .insert(surface.nfc().collect(), pronunciation.nfc().collect());
    }

    /// 合并另一张表（对方优先）
    pub fn merge(&mut self, other: ExceptionTable) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, surface: &str) -> Option<&str> {
        match self.entries.get(surface) {
            Some(v) => Some(v.as_str()),
            None => {
                let normalized: String = surface.nfc().collect();
                self.entries.get(&normalized).map(|v| v.as_str())
            }
        }
    }

    pub fn contains(&self, surface: &str) -> bool {
        self.get(surface).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// 规则集
// ============================================================================

/// 规则集：编译后的模式目录 + 例外表，加载后只读
#[derive(Debug)]
pub struct RuleSet {
    version: String,
    /// 源数据的 SHA-256
    fingerprint: String,
    catalog: PatternCatalog,
    exceptions: ExceptionTable,
}

impl RuleSet {
    /// 内置规则集
    pub fn builtin() -> Result<Self, RuleSetError> {
        Self::from_json(BUILTIN_RULES)
    }

    /// 从规则文件加载
    pub fn load(path: &Path) -> Result<Self, RuleSetError> {
        tracing::info!("加载规则集: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| RuleSetError::io(path, e))?;
        Self::from_json(&content)
    }

    pub fn from_json(source: &str) -> Result<Self, RuleSetError> {
        let file = RuleFile::from_json(source)?;
        let fingerprint = format!("{:x}", Sha256::digest(source.as_bytes()));
        Self::build(file, fingerprint)
    }

    pub fn from_rule_file(file: RuleFile) -> Result<Self, RuleSetError> {
        let serialized =
            serde_json::to_string(&file).map_err(|e| RuleSetError::json("规则文件", e))?;
        let fingerprint = format!("{:x}", Sha256::digest(serialized.as_bytes()));
        Self::build(file, fingerprint)
    }

    fn build(file: RuleFile, fingerprint: String) -> Result<Self, RuleSetError> {
        file.validate()?;
        let catalog = PatternCatalog::compile(&file.rules)?;
        let exceptions = ExceptionTable::from_map(file.exceptions);

        tracing::info!(
            "规则集 {} 已加载: {} 条规则, {} 条例外",
            file.version,
            catalog.len(),
            exceptions.len()
        );

        Ok(Self {
            version: file.version,
            fingerprint,
            catalog,
            exceptions,
        })
    }

    /// 叠加外部例外表（外部条目优先）
    pub fn with_exceptions(mut self, extra: ExceptionTable) -> Self {
        tracing::info!("叠加 {} 条外部例外", extra.len());
        self.exceptions.merge(extra);
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    pub fn exceptions(&self) -> &ExceptionTable {
        &self.exceptions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal(rules: &str) -> String {
        format!(r#"{{"version": "test", "rules": [{}]}}"#, rules)
    }

    #[test]
    fn test_builtin_rule_set_loads() {
        let rules = RuleSet::builtin().unwrap();
        assert!(!rules.version().is_empty());
        assert!(rules.catalog().len() > 20);
        assert_eq!(rules.exceptions().get("WOS"), Some("Woes"));
        assert_eq!(rules.fingerprint().len(), 64);
    }

    #[test]
    fn test_duplicate_rule_id_rejected() {
        let rule = r#"{"id": "a", "category": "cardinal", "priority": 1,
                       "pattern": [{"kind": "numeral"}], "rewrite": {"kind": "cardinal"}}"#;
        let source = minimal(&format!("{},{}", rule, rule));
        assert!(matches!(
            RuleSet::from_json(&source),
            Err(RuleSetError::DuplicateRule(id)) if id == "a"
        ));
    }

    #[test]
    fn test_pattern_without_required_element_rejected() {
        let source = minimal(
            r#"{"id": "opt", "category": "cardinal", "priority": 1,
                "pattern": [{"kind": "numeral", "repeat": "optional"}], "rewrite": {"kind": "keep"}}"#,
        );
        assert!(matches!(
            RuleSet::from_json(&source),
            Err(RuleSetError::EmptyPattern(_))
        ));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let source = minimal(
            r#"{"id": "bad", "category": "cardinal", "priority": 1,
                "pattern": [{"regex": "(unclosed"}], "rewrite": {"kind": "keep"}}"#,
        );
        assert!(matches!(
            RuleSet::from_json(&source),
            Err(RuleSetError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_missing_version_rejected() {
        assert!(matches!(
            RuleSet::from_json(r#"{"version": " ", "rules": []}"#),
            Err(RuleSetError::MissingVersion)
        ));
    }

    #[test]
    fn test_fingerprint_tracks_source() {
        let a = RuleSet::from_json(r#"{"version": "r1", "rules": []}"#).unwrap();
        let b = RuleSet::from_json(r#"{"version": "r2", "rules": []}"#).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"version": "round-2", "exceptions": {{"FOIA": "Foya"}}}}"#).unwrap();
        let rules = RuleSet::load(file.path()).unwrap();
        assert_eq!(rules.version(), "round-2");
        assert_eq!(rules.exceptions().get("FOIA"), Some("Foya"));
        assert!(rules.catalog().is_empty());
    }

    #[test]
    fn test_exception_table_merge_and_normalization() {
        let mut table = ExceptionTable::from_json(r#"{"WOS": "Woes", "  ": "x"}"#).unwrap();
        assert_eq!(table.len(), 1);

        // 组合字符形式的 é 查找时与预组合形式一致
        table.insert("caf\u{e9}", "cafe");
        assert_eq!(table.get("cafe\u{301}"), Some("cafe"));

        let mut extra = ExceptionTable::new();
        extra.insert("WOS", "Double you oh ess");
        table.merge(extra);
        assert_eq!(table.get("WOS"), Some("Double you oh ess"));
    }

    #[test]
    fn test_with_exceptions_overrides() {
        let mut extra = ExceptionTable::new();
        extra.insert("BIA", "Bia");
        let rules = RuleSet::builtin().unwrap().with_exceptions(extra);
        assert_eq!(rules.exceptions().get("BIA"), Some("Bia"));
        assert_eq!(rules.exceptions().get("WOS"), Some("Woes"));
    }
}
