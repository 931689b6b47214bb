use libloading::Library;
use std::fmt;
use std::sync::Arc;
use tree_sitter::Language;
use tree_sitter_language::LanguageFn;

/// 语法入口点：生成的解析器导出的 `tree_sitter_<name>()`
pub(crate) type EntryPoint = unsafe extern "C" fn() -> *const ();

/// 语言定义句柄
///
/// 由 grammar provider 创建，内容对调用方不透明，只能交给
/// [`LanguageLoader`](crate::loader::LanguageLoader) 加载。入口点缺失或返回空指针时
/// 句柄视为“空”。来自动态库的句柄持有该库的共享引用，保证语法表不会先于句柄被卸载。
#[derive(Clone)]
pub struct LanguageHandle {
    name: String,
    entry: Option<EntryPoint>,
    owner: Option<Arc<Library>>,
}

impl LanguageHandle {
    /// 由编译期链接的语法入口点创建句柄，`name` 为用于报告的显示名（如 "Cairo"）
    pub fn new(name: impl Into<String>, language: LanguageFn) -> Self {
        Self {
            name: name.into(),
            entry: Some(language.into_raw()),
            owner: None,
        }
    }

    pub(crate) fn linked(name: impl Into<String>, entry: EntryPoint) -> Self {
        Self {
            name: name.into(),
            entry: Some(entry),
            owner: None,
        }
    }

    /// 空句柄：对应语法产物不存在的情况
    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: None,
            owner: None,
        }
    }

    pub(crate) fn from_library(name: impl Into<String>, entry: EntryPoint, owner: Arc<Library>) -> Self {
        Self {
            name: name.into(),
            entry: Some(entry),
            owner: Some(owner),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 入口点缺失，或入口点返回空指针
    pub fn is_absent(&self) -> bool {
        self.raw().is_null()
    }

    fn raw(&self) -> *const () {
        match self.entry {
            // SAFETY: 入口点来自生成的解析器，无参数、无副作用，只返回静态语法表地址
            Some(entry) => unsafe { entry() },
            None => std::ptr::null(),
        }
    }

    /// 转换为 tree-sitter 的 [`Language`]；空句柄返回 `None`
    pub(crate) fn resolve(&self) -> Option<Language> {
        if self.is_absent() {
            return None;
        }
        let entry = self.entry?;
        // SAFETY: 入口点签名与 tree-sitter 生成代码的 `const TSLanguage *tree_sitter_<name>(void)` 一致
        let language_fn = unsafe { LanguageFn::from_raw(entry) };
        Some(Language::new(language_fn))
    }

    pub(crate) fn owner(&self) -> Option<Arc<Library>> {
        self.owner.clone()
    }
}

impl fmt::Debug for LanguageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageHandle")
            .field("name", &self.name)
            .field("absent", &self.is_absent())
            .field("shared_library", &self.owner.is_some())
            .finish()
    }
}
