//! 加载已编译的 tree-sitter 语法并做冒烟测试
//!
//! [`provider::GrammarProvider`] 给出不透明的 [`handle::LanguageHandle`]，
//! [`loader::LanguageLoader`] 把句柄交给 tree-sitter 运行时加载，
//! [`smoke`] 汇总每个语法的加载结果。Cairo 语法见 [`cairo`]。

pub mod cairo;
pub mod handle;
pub mod library;
pub mod loader;
pub mod provider;
pub mod smoke;
