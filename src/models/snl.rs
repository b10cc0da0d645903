//! # 结构注记记录 (SNL)
//!
//! 带溯源信息的晶体结构记录：作者、项目、BibTeX 参考文献、
//! 历史节点。可序列化为 JSON 随任务目录存档。
//!
//! ## 依赖关系
//! - 被 `commands/run.rs` 使用
//! - 使用 `models/structure.rs`

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AbitoolError, Result};
use crate::models::structure::Crystal;

/// 单个历史节点的最大字节数
pub const MAX_HNODE_SIZE: usize = 64_000;

/// data 字段的最大字节数
pub const MAX_DATA_SIZE: usize = 256_000;

/// 历史节点数量上限
pub const MAX_HNODES: usize = 100;

/// BibTeX 参考文献的最大字符数
pub const MAX_BIBTEX_CHARS: usize = 20_000;

/// 粗验证 BibTeX 格式：至少包含一个 @类型{键, 条目
pub fn is_valid_bibtex(reference: &str) -> bool {
    // 条目头形如 "@article{key," 即可接受
    let entry = Regex::new(r"@[A-Za-z]+\s*\{\s*[^,\s]+\s*,").expect("static regex");
    entry.is_match(reference)
}

/// 历史节点：结构形成过程中的一步（数据库来源、变换等）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryNode {
    /// 代码或资源名称
    pub name: String,

    /// 代码/资源的 URL
    pub url: String,

    /// 自由格式的描述
    pub description: Value,
}

impl HistoryNode {
    pub fn new(name: impl Into<String>, url: impl Into<String>, description: Value) -> Self {
        HistoryNode {
            name: name.into(),
            url: url.into(),
            description,
        }
    }
}

/// 作者：姓名 + 邮箱
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    /// 解析 "Name <email@domain>" 形式的作者串
    pub fn parse(author: &str) -> Result<Author> {
        let re = Regex::new(r"^\s*(.*?)\s*<(.*?@.*?)>\s*$").expect("static regex");
        let caps = re
            .captures(author)
            .ok_or_else(|| AbitoolError::InvalidRecord(format!("Invalid author: {}", author)))?;

        Ok(Author {
            name: caps[1].to_string(),
            email: caps[2].to_string(),
        })
    }

    /// 解析逗号分隔的多作者串
    pub fn parse_list(authors: &str) -> Result<Vec<Author>> {
        authors
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(Author::parse)
            .collect()
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// SNL 记录的元信息块
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct About {
    pub authors: Vec<Author>,
    pub projects: Vec<String>,
    pub references: String,
    pub remarks: Vec<String>,
    pub data: Value,
    pub history: Vec<HistoryNode>,
    pub created_at: DateTime<Utc>,
}

/// 带溯源的结构记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureNl {
    pub structure: Crystal,
    pub about: About,
}

impl StructureNl {
    /// 创建并校验一条记录
    ///
    /// 校验项：作者非空、BibTeX 格式与长度、data 与历史节点的
    /// 大小上限、历史节点数量。
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        structure: Crystal,
        authors: Vec<Author>,
        projects: Vec<String>,
        references: String,
        remarks: Vec<String>,
        data: Value,
        history: Vec<HistoryNode>,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<StructureNl> {
        if authors.is_empty() {
            return Err(AbitoolError::InvalidRecord(
                "At least one author is required".to_string(),
            ));
        }

        if !references.is_empty() && !is_valid_bibtex(&references) {
            return Err(AbitoolError::InvalidRecord(
                "Reference should be a BibTeX string".to_string(),
            ));
        }

        if references.len() > MAX_BIBTEX_CHARS {
            return Err(AbitoolError::InvalidRecord(format!(
                "BibTeX string must be fewer than {} chars, got {}",
                MAX_BIBTEX_CHARS,
                references.len()
            )));
        }

        let data_size = serde_json::to_string(&data)?.len();
        if data_size >= MAX_DATA_SIZE {
            return Err(AbitoolError::InvalidRecord(format!(
                "Data field exceeds the size limit of {} bytes ({})",
                MAX_DATA_SIZE, data_size
            )));
        }

        if history.len() > MAX_HNODES {
            return Err(AbitoolError::InvalidRecord(format!(
                "A maximum of {} history nodes are supported, got {}",
                MAX_HNODES,
                history.len()
            )));
        }

        for node in &history {
            let size = serde_json::to_string(node)?.len();
            if size >= MAX_HNODE_SIZE {
                return Err(AbitoolError::InvalidRecord(format!(
                    "History node '{}' exceeds the size limit of {} bytes",
                    node.name, MAX_HNODE_SIZE
                )));
            }
        }

        Ok(StructureNl {
            structure,
            about: About {
                authors,
                projects,
                references,
                remarks,
                data,
                history,
                created_at: created_at.unwrap_or_else(Utc::now),
            },
        })
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 从 JSON 字符串反序列化
    pub fn from_json(json: &str) -> Result<StructureNl> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::structure::{Atom, Lattice};
    use serde_json::json;

    fn test_crystal() -> Crystal {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        Crystal::new("Si2", lattice, vec![
            Atom::new("Si", [0.0, 0.0, 0.0]),
            Atom::new("Si", [0.25, 0.25, 0.25]),
        ])
    }

    #[test]
    fn test_author_parse() {
        let a = Author::parse("John Doe <johndoe@gmail.com>").unwrap();
        assert_eq!(a.name, "John Doe");
        assert_eq!(a.email, "johndoe@gmail.com");
        assert_eq!(a.to_string(), "John Doe <johndoe@gmail.com>");
    }

    #[test]
    fn test_author_parse_rejects_bad_format() {
        assert!(Author::parse("John Doe").is_err());
        assert!(Author::parse("John Doe <not-an-email>").is_err());
    }

    #[test]
    fn test_author_parse_list() {
        let list = Author::parse_list("A B <a@b.org>, C D <c@d.org>").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].name, "C D");
    }

    #[test]
    fn test_bibtex_validation() {
        assert!(is_valid_bibtex(
            "@article{doe2020, title={A Title}, year={2020}}"
        ));
        assert!(!is_valid_bibtex("not a reference"));
    }

    #[test]
    fn test_snl_round_trip() {
        let snl = StructureNl::new(
            test_crystal(),
            vec![Author::parse("Jane Roe <jane@roe.net>").unwrap()],
            vec!["Project A".to_string()],
            String::new(),
            vec!["test remark".to_string()],
            json!({"_abitool": {"run": 1}}),
            vec![HistoryNode::new(
                "icsd",
                "https://icsd.example.org",
                json!({"icsd_id": 181356}),
            )],
            None,
        )
        .unwrap();

        let text = snl.to_json().unwrap();
        let back = StructureNl::from_json(&text).unwrap();

        assert_eq!(back.about.authors, snl.about.authors);
        assert_eq!(back.about.history, snl.about.history);
        assert_eq!(back.structure.atoms.len(), 2);
        assert_eq!(back.about.created_at, snl.about.created_at);
    }

    #[test]
    fn test_snl_rejects_invalid_reference() {
        let result = StructureNl::new(
            test_crystal(),
            vec![Author::parse("Jane Roe <jane@roe.net>").unwrap()],
            vec![],
            "garbage".to_string(),
            vec![],
            json!({}),
            vec![],
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_snl_rejects_too_many_history_nodes() {
        let node = HistoryNode::new("step", "https://example.org", json!({}));
        let result = StructureNl::new(
            test_crystal(),
            vec![Author::parse("Jane Roe <jane@roe.net>").unwrap()],
            vec![],
            String::new(),
            vec![],
            json!({}),
            vec![node; MAX_HNODES + 1],
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_snl_requires_author() {
        let result = StructureNl::new(
            test_crystal(),
            vec![],
            vec![],
            String::new(),
            vec![],
            json!({}),
            vec![],
            None,
        );
        assert!(result.is_err());
    }
}
