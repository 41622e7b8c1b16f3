//! TNL 片段编辑器 / 对齐跟踪
//!
//! 按原文顺序接收改写和删除，拼出规范化文本，同时记录对齐片段。
//! 对齐片段的原文区间首尾相接，恰好覆盖整个原文。

use crate::tnl::types::{AlignmentKind, AlignmentSpan};

/// 片段编辑器
pub struct SpanEditor<'t> {
    original: &'t str,
    normalized: String,
    spans: Vec<AlignmentSpan>,
    /// 已处理到的原文偏移
    cursor: usize,
}

impl<'t> SpanEditor<'t> {
    pub fn new(original: &'t str) -> Self {
        Self {
            original,
            normalized: String::with_capacity(original.len()),
            spans: Vec::new(),
            cursor: 0,
        }
    }

    /// 当前已生成的规范化文本
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// 用 `replacement` 替换原文 [start, end)
    ///
    /// 替换文本与相邻字母数字紧贴时补一个空格（§1983 → "Section nineteen eighty three"），
    /// 补出的空格计入该改写片段
    pub fn replace(&mut self, start: usize, end: usize, replacement: &str) -> bool {
        if !self.accepts(start, end) {
            return false;
        }
        self.copy_verbatim(start);

        let normalized_start = self.normalized.len();
        let starts_alnum = replacement.chars().next().is_some_and(char::is_alphanumeric);
        let ends_alnum = replacement.chars().next_back().is_some_and(char::is_alphanumeric);
        if starts_alnum && self.normalized.chars().next_back().is_some_and(char::is_alphanumeric) {
            self.normalized.push(' ');
        }
        self.normalized.push_str(replacement);
        if ends_alnum && self.original[end..].chars().next().is_some_and(char::is_alphanumeric) {
            self.normalized.push(' ');
        }

        self.spans.push(AlignmentSpan {
            original_start: start,
            original_end: end,
            normalized: Some((normalized_start, self.normalized.len())),
            kind: AlignmentKind::Rewritten,
        });
        self.cursor = end;
        true
    }

    /// 删除原文 [start, end)
    ///
    /// 同时吸收前面的空白；前面没有输出时改为吸收后面的空白，避免留下多余空格
    pub fn strip(&mut self, start: usize, end: usize) -> bool {
        if !self.accepts(start, end) {
            return false;
        }

        let gap = &self.original[self.cursor..start];
        let kept = gap.trim_end();
        let has_output_before = !self.normalized.is_empty() || !kept.is_empty();

        let (delete_start, delete_end) = if has_output_before && kept.len() < gap.len() {
            (self.cursor + kept.len(), end)
        } else {
            let rest = &self.original[end..];
            (start, end + (rest.len() - rest.trim_start().len()))
        };

        self.copy_verbatim(delete_start);
        self.spans.push(AlignmentSpan {
            original_start: delete_start,
            original_end: delete_end,
            normalized: None,
            kind: AlignmentKind::Deleted,
        });
        self.cursor = delete_end;
        true
    }

    /// 结束编辑，返回规范化文本和对齐片段
    pub fn finish(mut self) -> (String, Vec<AlignmentSpan>) {
        self.copy_verbatim(self.original.len());
        (self.normalized, self.spans)
    }

    /// 编辑必须按顺序且不重叠
    fn accepts(&self, start: usize, end: usize) -> bool {
        let valid = start >= self.cursor
            && start <= end
            && end <= self.original.len()
            && self.original.is_char_boundary(start)
            && self.original.is_char_boundary(end);
        if !valid {
            tracing::warn!(
                "TNL: 忽略无效编辑 [{}, {})，当前位置 {}",
                start,
                end,
                self.cursor
            );
        }
        valid
    }

    /// 把 [cursor, until) 原样复制到输出
    fn copy_verbatim(&mut self, until: usize) {
        if until <= self.cursor {
            return;
        }
        let normalized_start = self.normalized.len();
        self.normalized.push_str(&self.original[self.cursor..until]);
        self.spans.push(AlignmentSpan {
            original_start: self.cursor,
            original_end: until,
            normalized: Some((normalized_start, self.normalized.len())),
            kind: AlignmentKind::Verbatim,
        });
        self.cursor = until;
    }
}

/// 检查对齐片段是否无缝、无重叠地覆盖 `len` 字节的原文
pub fn spans_tile(spans: &[AlignmentSpan], len: usize) -> bool {
    let mut expected = 0;
    for span in spans {
        if span.original_start != expected || span.original_end < span.original_start {
            return false;
        }
        expected = span.original_end;
    }
    expected == len
}
