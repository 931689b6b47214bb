use crate::handle::{EntryPoint, LanguageHandle};
use tree_sitter_language::LanguageFn;

// ── GrammarProvider trait ─────────────────────────────────────────────────────

/// 语法提供者：以零参数访问器给出语言定义句柄
pub trait GrammarProvider {
    /// 语法标识，小写（如 "cairo"、"tsx"）
    fn name(&self) -> &str;
    /// 报告中使用的显示名（如 "Cairo"）
    fn display_name(&self) -> &str;
    fn language(&self) -> LanguageHandle;

    /// 语法产物的指纹；编译期链接的语法没有独立产物
    fn artifact(&self) -> Option<String> {
        None
    }
}

// ── StaticGrammar ─────────────────────────────────────────────────────────────

/// 编译期链接进二进制的语法
#[derive(Debug, Clone, Copy)]
pub struct StaticGrammar {
    name: &'static str,
    display_name: &'static str,
    entry: Option<EntryPoint>,
}

impl StaticGrammar {
    pub const fn new(name: &'static str, display_name: &'static str, language: LanguageFn) -> Self {
        Self {
            name,
            display_name,
            entry: Some(language.into_raw()),
        }
    }

    /// 未链接的语法，language() 总是返回空句柄
    pub const fn absent(name: &'static str, display_name: &'static str) -> Self {
        Self {
            name,
            display_name,
            entry: None,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.entry.is_some()
    }
}

impl GrammarProvider for StaticGrammar {
    fn name(&self) -> &str {
        self.name
    }

    fn display_name(&self) -> &str {
        self.display_name
    }

    fn language(&self) -> LanguageHandle {
        match self.entry {
            Some(entry) => LanguageHandle::linked(self.display_name, entry),
            None => LanguageHandle::absent(self.display_name),
        }
    }
}

// ── 内置参考语法 ──────────────────────────────────────────────────────────────

/// 随 tree-sitter 运行时一起发布的参考语法（不含 Cairo）
pub const REFERENCE_GRAMMARS: &[StaticGrammar] = &[
    StaticGrammar::new("typescript", "TypeScript", tree_sitter_typescript::LANGUAGE_TYPESCRIPT),
    StaticGrammar::new("tsx", "TSX", tree_sitter_typescript::LANGUAGE_TSX),
    StaticGrammar::new("javascript", "JavaScript", tree_sitter_javascript::LANGUAGE),
    StaticGrammar::new("python", "Python", tree_sitter_python::LANGUAGE),
    StaticGrammar::new("go", "Go", tree_sitter_go::LANGUAGE),
    StaticGrammar::new("rust", "Rust", tree_sitter_rust::LANGUAGE),
    StaticGrammar::new("java", "Java", tree_sitter_java::LANGUAGE),
    StaticGrammar::new("c", "C", tree_sitter_c::LANGUAGE),
    StaticGrammar::new("cpp", "C++", tree_sitter_cpp::LANGUAGE),
];

/// 所有内置语法：Cairo 在前（未链接时为空语法），其后是参考语法
pub fn bundled() -> Vec<StaticGrammar> {
    let mut grammars = Vec::with_capacity(REFERENCE_GRAMMARS.len() + 1);
    grammars.push(crate::cairo::grammar());
    grammars.extend_from_slice(REFERENCE_GRAMMARS);
    grammars
}

/// 按名称查找内置语法（不区分大小写）
pub fn find_bundled(name: &str) -> Option<StaticGrammar> {
    let name = name.to_lowercase();
    bundled().into_iter().find(|g| g.name == name)
}
