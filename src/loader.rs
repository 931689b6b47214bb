use crate::handle::LanguageHandle;
use crate::library::LibraryError;
use libloading::Library;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tree_sitter::{Language, Node, Parser};

// ── 错误类型 ──────────────────────────────────────────────────────────────────

/// 语法加载失败
///
/// 只有这一种错误：显示文本固定为 `Error loading <Name> grammar`，具体原因挂在
/// [`source`](std::error::Error::source) 上，仅用于诊断。
#[derive(Debug, Error)]
#[error("Error loading {grammar} grammar")]
pub struct GrammarLoadError {
    grammar: String,
    #[source]
    cause: LoadFailure,
}

impl GrammarLoadError {
    pub fn new(grammar: impl Into<String>, cause: LoadFailure) -> Self {
        Self {
            grammar: grammar.into(),
            cause,
        }
    }

    pub fn grammar(&self) -> &str {
        &self.grammar
    }

    pub fn cause(&self) -> &LoadFailure {
        &self.cause
    }
}

#[derive(Debug, Error)]
pub enum LoadFailure {
    #[error("language handle is null")]
    NullHandle,
    #[error("ABI version {found} is outside the supported range {min}..={max}")]
    IncompatibleAbi { found: usize, min: usize, max: usize },
    #[error("parser rejected the language: {0}")]
    Rejected(#[from] tree_sitter::LanguageError),
    #[error("language declares no node kinds")]
    NoNodeKinds,
    #[error(transparent)]
    Library(#[from] LibraryError),
}

// ── LoadedLanguage ────────────────────────────────────────────────────────────

/// 已被运行时接受的语言
pub struct LoadedLanguage {
    name: String,
    language: Language,
    abi_version: usize,
    node_kind_count: usize,
    // 必须排在 language 之后：先释放语言，再卸载持有语法表的动态库
    _owner: Option<Arc<Library>>,
}

impl LoadedLanguage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn abi_version(&self) -> usize {
        self.abi_version
    }

    pub fn node_kind_count(&self) -> usize {
        self.node_kind_count
    }

    /// 用该语言解析一段源码，返回语法树概要；解析器被取消时返回 `None`
    pub fn parse(&self, source: &str) -> Option<ParseSummary> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).ok()?;
        let tree = parser.parse(source, None)?;
        let root = tree.root_node();

        let mut first_error = None;
        find_first_error(root, &mut first_error);

        Some(ParseSummary {
            root_kind: root.kind().to_string(),
            has_error: root.has_error(),
            first_error: first_error.map(|p| ErrorPosition {
                line: p.row + 1,
                column: p.column + 1,
            }),
            bytes: source.len(),
        })
    }
}

impl std::fmt::Debug for LoadedLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedLanguage")
            .field("name", &self.name)
            .field("abi_version", &self.abi_version)
            .field("node_kind_count", &self.node_kind_count)
            .finish()
    }
}

/// 样例解析结果概要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    #[serde(rename = "rootKind")]
    pub root_kind: String,
    #[serde(rename = "hasError")]
    pub has_error: bool,
    #[serde(rename = "firstError", skip_serializing_if = "Option::is_none")]
    pub first_error: Option<ErrorPosition>,
    pub bytes: usize,
}

/// 1 起始的行列号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorPosition {
    pub line: usize,
    pub column: usize,
}

/// 深度优先查找第一个 ERROR 或 MISSING 节点
fn find_first_error(node: Node, found: &mut Option<tree_sitter::Point>) {
    if found.is_some() || !node.has_error() {
        return;
    }
    if node.is_error() || node.is_missing() {
        *found = Some(node.start_position());
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        find_first_error(child, found);
        if found.is_some() {
            return;
        }
    }
}

// ── LanguageLoader trait ──────────────────────────────────────────────────────

/// 通用语言加载器：句柄 → 已加载语言，或加载失败
pub trait LanguageLoader {
    fn load(&self, handle: &LanguageHandle) -> Result<LoadedLanguage, GrammarLoadError>;
}

/// 基于 tree-sitter 运行时的加载器
#[derive(Debug, Clone, Copy)]
pub struct TreeSitterLoader {
    min_abi: usize,
    max_abi: usize,
}

impl TreeSitterLoader {
    /// 接受当前运行时支持的全部 ABI 版本
    pub fn new() -> Self {
        Self {
            min_abi: tree_sitter::MIN_COMPATIBLE_LANGUAGE_VERSION,
            max_abi: tree_sitter::LANGUAGE_VERSION,
        }
    }

    /// 收窄可接受的 ABI 版本区间（不能超出运行时本身的支持范围）
    pub fn with_abi_range(min: usize, max: usize) -> Self {
        Self {
            min_abi: min.max(tree_sitter::MIN_COMPATIBLE_LANGUAGE_VERSION),
            max_abi: max.min(tree_sitter::LANGUAGE_VERSION),
        }
    }

    pub fn abi_range(&self) -> (usize, usize) {
        (self.min_abi, self.max_abi)
    }

    fn check(&self, handle: &LanguageHandle) -> Result<(Language, usize, usize), LoadFailure> {
        let language = handle.resolve().ok_or(LoadFailure::NullHandle)?;

        let abi_version = language.abi_version();
        if abi_version < self.min_abi || abi_version > self.max_abi {
            return Err(LoadFailure::IncompatibleAbi {
                found: abi_version,
                min: self.min_abi,
                max: self.max_abi,
            });
        }

        let mut parser = Parser::new();
        parser.set_language(&language)?;

        let node_kind_count = language.node_kind_count();
        if node_kind_count == 0 {
            return Err(LoadFailure::NoNodeKinds);
        }

        Ok((language, abi_version, node_kind_count))
    }
}

impl Default for TreeSitterLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageLoader for TreeSitterLoader {
    fn load(&self, handle: &LanguageHandle) -> Result<LoadedLanguage, GrammarLoadError> {
        match self.check(handle) {
            Ok((language, abi_version, node_kind_count)) => {
                log::debug!(
                    "loaded {} grammar (ABI {}, {} node kinds)",
                    handle.name(),
                    abi_version,
                    node_kind_count
                );
                Ok(LoadedLanguage {
                    name: handle.name().to_string(),
                    language,
                    abi_version,
                    node_kind_count,
                    _owner: handle.owner(),
                })
            }
            Err(cause) => {
                log::warn!("failed to load {} grammar: {}", handle.name(), cause);
                Err(GrammarLoadError::new(handle.name(), cause))
            }
        }
    }
}
