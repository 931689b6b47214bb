//! 从动态库加载已编译的语法
//!
//! tree-sitter 语法可以编译成动态库（`make` 生成 `libtree-sitter-<name>.so`，
//! tree-sitter CLI 的缓存目录里是 `<name>.so`），库中导出 `tree_sitter_<name>` 入口点。

use crate::handle::{EntryPoint, LanguageHandle};
use crate::provider::{find_bundled, GrammarProvider};
use libloading::Library;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

/// 动态库扩展名
const LIBRARY_EXTENSIONS: &[&str] = &["so", "dylib", "dll"];

/// 库文件名中可去掉的前缀，按顺序匹配
const LIBRARY_PREFIXES: &[&str] = &["libtree-sitter-", "tree-sitter-"];

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("cannot open grammar library '{}': {}", path.display(), reason)]
    Open { path: PathBuf, reason: String },
    #[error("grammar library '{}' does not export `{}`", path.display(), symbol)]
    MissingSymbol { path: PathBuf, symbol: String },
    #[error("cannot read grammar library '{}': {}", path.display(), source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ── SharedLibraryGrammar ──────────────────────────────────────────────────────

/// 由动态库提供的语法
pub struct SharedLibraryGrammar {
    name: String,
    display_name: String,
    path: PathBuf,
    fingerprint: String,
    entry: EntryPoint,
    library: Arc<Library>,
}

impl SharedLibraryGrammar {
    /// 打开 `path` 处的动态库并解析 `tree_sitter_<name>` 入口点
    ///
    /// 路径先规范化为绝对路径：不含 `/` 的文件名交给 `dlopen` 时会去系统库目录
    /// 查找，而不是当前目录，指纹和实际加载的库就可能不是同一个文件。
    pub fn open(path: impl AsRef<Path>, name: &str) -> Result<Self, LibraryError> {
        let path = resolve_path(path.as_ref())?;
        let path = path.as_path();
        let symbol = symbol_name(name);
        let fingerprint = fingerprint_file(path)?;

        // SAFETY: 语法动态库只包含静态表和纯函数，加载时不执行初始化代码
        let library = unsafe { Library::new(path) }.map_err(|e| LibraryError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // SAFETY: 入口点签名为 `const TSLanguage *tree_sitter_<name>(void)`
        let entry: EntryPoint = unsafe {
            let sym = library
                .get::<EntryPoint>(symbol.as_bytes())
                .map_err(|_| LibraryError::MissingSymbol {
                    path: path.to_path_buf(),
                    symbol: symbol.clone(),
                })?;
            *sym
        };

        log::info!(
            "opened {} grammar library {} ({})",
            name,
            path.display(),
            fingerprint
        );

        Ok(Self {
            name: name.to_string(),
            display_name: display_name_for(name),
            path: path.to_path_buf(),
            fingerprint,
            entry,
            library: Arc::new(library),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl GrammarProvider for SharedLibraryGrammar {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn language(&self) -> LanguageHandle {
        LanguageHandle::from_library(self.display_name.clone(), self.entry, Arc::clone(&self.library))
    }

    fn artifact(&self) -> Option<String> {
        Some(self.fingerprint.clone())
    }
}

impl std::fmt::Debug for SharedLibraryGrammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedLibraryGrammar")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

// ── 命名规则 ──────────────────────────────────────────────────────────────────

/// 语法入口点的 C 符号名：`tree_sitter_<name>`，`-` 替换为 `_`
pub fn symbol_name(name: &str) -> String {
    format!("tree_sitter_{}", name.to_lowercase().replace('-', "_"))
}

/// 显示名：内置语法用已知名称，其余首字母大写
pub fn display_name_for(name: &str) -> String {
    if let Some(grammar) = find_bundled(name) {
        return grammar.display_name().to_string();
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 从库文件路径推断语法名；不是动态库时返回 `None`
pub fn grammar_name_from_path(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if !LIBRARY_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let name = LIBRARY_PREFIXES
        .iter()
        .find_map(|prefix| stem.strip_prefix(prefix))
        .unwrap_or(stem);
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| name.to_lowercase())
}

// ── 目录发现 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLibrary {
    pub name: String,
    pub path: PathBuf,
}

/// 列出目录（不递归）中的语法动态库，按语法名排序；同名时保留路径排序靠前的一个
pub fn discover(dir: &Path) -> Vec<DiscoveredLibrary> {
    let mut found: Vec<DiscoveredLibrary> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.into_path();
            grammar_name_from_path(&path).map(|name| DiscoveredLibrary { name, path })
        })
        .collect();

    found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    found.dedup_by(|later, earlier| later.name == earlier.name);
    found
}

// ── 产物指纹 ──────────────────────────────────────────────────────────────────

/// 产物指纹（sha256 前 16 个十六进制字符）
pub fn fingerprint(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256:{}", &hex[..16])
}

/// 规范化库路径（绝对路径，解析符号链接）
pub fn resolve_path(path: &Path) -> Result<PathBuf, LibraryError> {
    std::fs::canonicalize(path).map_err(|source| LibraryError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn fingerprint_file(path: &Path) -> Result<String, LibraryError> {
    let content = std::fs::read(path).map_err(|source| LibraryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(fingerprint(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_name() {
        assert_eq!(symbol_name("cairo"), "tree_sitter_cairo");
        assert_eq!(symbol_name("c-sharp"), "tree_sitter_c_sharp");
        assert_eq!(symbol_name("TSX"), "tree_sitter_tsx");
    }

    #[test]
    fn test_display_name_for() {
        assert_eq!(display_name_for("cairo"), "Cairo");
        assert_eq!(display_name_for("cpp"), "C++");
        assert_eq!(display_name_for("zig"), "Zig");
        assert_eq!(display_name_for(""), "");
    }

    #[test]
    fn test_grammar_name_from_path() {
        assert_eq!(grammar_name_from_path(Path::new("libtree-sitter-cairo.so")).as_deref(), Some("cairo"));
        assert_eq!(grammar_name_from_path(Path::new("/cache/lib/cairo.so")).as_deref(), Some("cairo"));
        assert_eq!(grammar_name_from_path(Path::new("tree-sitter-c-sharp.dll")).as_deref(), Some("c-sharp"));
        assert_eq!(grammar_name_from_path(Path::new("Cairo.DYLIB")).as_deref(), Some("cairo"));
        assert_eq!(grammar_name_from_path(Path::new("cairo.a")), None);
        assert_eq!(grammar_name_from_path(Path::new("README")), None);
        assert_eq!(grammar_name_from_path(Path::new("libtree-sitter-.so")), None);
        assert_eq!(grammar_name_from_path(Path::new("bad name.so")), None);
    }

    #[test]
    fn test_fingerprint_format() {
        let hash = fingerprint(b"grammar");
        assert!(hash.starts_with("sha256:"));
        assert_eq!(hash.len(), 7 + 16);
        assert_eq!(hash, fingerprint(b"grammar"));
        assert_ne!(hash, fingerprint(b"grammar2"));
    }

    #[test]
    fn test_open_missing_file() {
        let err = SharedLibraryGrammar::open("/nonexistent/libtree-sitter-cairo.so", "cairo").unwrap_err();
        assert!(matches!(err, LibraryError::Read { .. }));
    }

    #[test]
    fn test_open_not_a_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libtree-sitter-cairo.so");
        std::fs::write(&path, b"not an ELF file").unwrap();
        let err = SharedLibraryGrammar::open(&path, "cairo").unwrap_err();
        assert!(matches!(err, LibraryError::Open { .. }));
        assert!(err.to_string().contains("libtree-sitter-cairo.so"));
    }

    /// 系统里一定存在、但不导出任何 tree-sitter 入口点的动态库
    fn system_shared_object() -> Option<PathBuf> {
        [
            "/lib/x86_64-linux-gnu/libm.so.6",
            "/usr/lib/x86_64-linux-gnu/libm.so.6",
            "/lib/aarch64-linux-gnu/libm.so.6",
            "/usr/lib/aarch64-linux-gnu/libm.so.6",
            "/lib64/libm.so.6",
            "/usr/lib64/libm.so.6",
            "/usr/lib/libm.so.6",
            "/lib/libm.so.6",
        ]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
    }

    #[test]
    fn test_open_library_without_entry_point() {
        let Some(libm) = system_shared_object() else {
            eprintln!("no system libm found, skipping");
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mathgrammar.so");
        std::fs::copy(&libm, &path).unwrap();

        let err = SharedLibraryGrammar::open(&path, "mathgrammar").unwrap_err();
        match &err {
            LibraryError::MissingSymbol { path: reported, symbol } => {
                assert_eq!(symbol, "tree_sitter_mathgrammar");
                assert!(reported.is_absolute());
                assert!(reported.ends_with("mathgrammar.so"));
            }
            other => panic!("expected MissingSymbol, got {other}"),
        }

        let load_err = crate::loader::GrammarLoadError::new(
            display_name_for("mathgrammar"),
            crate::loader::LoadFailure::Library(err),
        );
        let case = crate::smoke::CaseResult::from_error("mathgrammar", &load_err);
        assert_eq!(case.message.as_deref(), Some("Error loading Mathgrammar grammar"));
        assert!(case.detail.unwrap().contains("does not export `tree_sitter_mathgrammar`"));
    }

    #[test]
    fn test_resolve_path_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cairo.so");
        std::fs::write(&path, b"").unwrap();
        let nested = dir.path().join(".").join("cairo.so");

        let resolved = resolve_path(&nested).unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(resolved, std::fs::canonicalize(&path).unwrap());
        assert!(matches!(
            resolve_path(Path::new("/nonexistent/cairo.so")),
            Err(LibraryError::Read { .. })
        ));
    }

    #[test]
    fn test_discover() {
        let dir = tempfile::tempdir().unwrap();
        for file in [
            "python.so",
            "libtree-sitter-cairo.so",
            "tree-sitter-foo-bar.dll",
            "notes.txt",
            "libtree-sitter-cairo.dylib",
        ] {
            std::fs::write(dir.path().join(file), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.so")).unwrap();

        let found = discover(dir.path());
        let names: Vec<&str> = found.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["cairo", "foo-bar", "python"]);
        assert!(found[0].path.ends_with("libtree-sitter-cairo.dylib"));
    }

    #[test]
    fn test_discover_missing_dir() {
        assert!(discover(Path::new("/nonexistent/grammars")).is_empty());
    }
}
