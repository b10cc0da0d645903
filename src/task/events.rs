//! # 日志事件解析器
//!
//! 扫描 ABINIT 主输出与日志中的半结构化事件标记
//! (COMMENT / WARNING / ERROR / BUG)。ERROR 与 BUG 为严重事件，
//! 直接决定任务进入 error 状态。
//!
//! ## 标记格式说明
//! 新版为 YAML 文档头：
//! ```text
//! --- !WARNING
//! message: |
//!     ...
//! ...
//! ```
//! 旧版为行内标记：` ERROR: scf cycle diverged`。两者都识别。
//!
//! ## 依赖关系
//! - 被 `task/status.rs`, `task/task.rs` 使用
//! - 使用 `regex`

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AbitoolError, Result};

/// 事件种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Comment,
    Warning,
    Error,
    Bug,
}

impl EventKind {
    /// ERROR 与 BUG 为严重事件
    pub fn is_critical(&self) -> bool {
        matches!(self, EventKind::Error | EventKind::Bug)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Comment => write!(f, "COMMENT"),
            EventKind::Warning => write!(f, "WARNING"),
            EventKind::Error => write!(f, "ERROR"),
            EventKind::Bug => write!(f, "BUG"),
        }
    }
}

/// 单个事件：种类、行号、消息摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub line: usize,
    pub message: String,
}

/// 一次解析的全部事件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventReport {
    pub events: Vec<Event>,
}

impl EventReport {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 严重事件列表
    pub fn critical_events(&self) -> Vec<&Event> {
        self.events.iter().filter(|e| e.kind.is_critical()).collect()
    }

    pub fn has_critical(&self) -> bool {
        self.events.iter().any(|e| e.kind.is_critical())
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}

/// 事件解析器
pub struct EventParser {
    marker: Regex,
}

impl EventParser {
    pub fn new() -> Self {
        // 同时匹配 "--- !WARNING" 与 " WARNING: ..."
        let marker = Regex::new(r"^(?:---\s*!|\s*)(COMMENT|WARNING|ERROR|BUG)\b:?\s*(.*)$")
            .expect("static regex");
        EventParser { marker }
    }

    /// 解析整个文件
    pub fn parse(&self, path: &Path) -> Result<EventReport> {
        let file = File::open(path).map_err(|e| AbitoolError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .map_while(|l| l.ok())
            .collect();

        Ok(self.parse_lines(&lines))
    }

    /// 解析已读入的行
    pub fn parse_lines(&self, lines: &[String]) -> EventReport {
        let mut events = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let caps = match self.marker.captures(line) {
                Some(c) => c,
                None => continue,
            };

            let kind = match &caps[1] {
                "COMMENT" => EventKind::Comment,
                "WARNING" => EventKind::Warning,
                "ERROR" => EventKind::Error,
                _ => EventKind::Bug,
            };

            // 消息取标记后的同行文本；为空则取下一行非空内容
            let mut message = caps[2].trim().to_string();
            if message.is_empty() {
                message = lines
                    .get(i + 1)
                    .map(|l| l.trim().trim_start_matches("message: |").trim().to_string())
                    .unwrap_or_default();
            }

            events.push(Event {
                kind,
                line: i + 1,
                message,
            });
        }

        EventReport { events }
    }
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_parse_yaml_style_markers() {
        let report = EventParser::new().parse_lines(&lines(
            "--- !WARNING\nscf is slow to converge\n...\n--- !ERROR\nstopped\n",
        ));

        assert_eq!(report.events.len(), 2);
        assert_eq!(report.events[0].kind, EventKind::Warning);
        assert_eq!(report.events[0].message, "scf is slow to converge");
        assert_eq!(report.events[1].kind, EventKind::Error);
        assert!(report.has_critical());
    }

    #[test]
    fn test_parse_inline_markers() {
        let report = EventParser::new().parse_lines(&lines(
            " COMMENT: finished dataset 1\n WARNING: ecut is low\n",
        ));

        assert_eq!(report.count(EventKind::Comment), 1);
        assert_eq!(report.count(EventKind::Warning), 1);
        assert!(!report.has_critical());
        assert_eq!(report.events[1].message, "ecut is low");
    }

    #[test]
    fn test_bug_is_critical() {
        let report = EventParser::new().parse_lines(&lines("--- !BUG\nleave_new called\n"));

        assert_eq!(report.critical_events().len(), 1);
        assert_eq!(report.events[0].kind, EventKind::Bug);
    }

    #[test]
    fn test_line_numbers_recorded() {
        let report =
            EventParser::new().parse_lines(&lines("ok\nok\n WARNING: third line\n"));
        assert_eq!(report.events[0].line, 3);
    }

    #[test]
    fn test_plain_text_has_no_events() {
        let report = EventParser::new().parse_lines(&lines(
            "total energy computed\nthe word error appears mid-sentence but is lowercase\n",
        ));
        assert!(report.is_empty());
    }
}
