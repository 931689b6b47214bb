//! Cairo 语法绑定
//!
//! `grammar/src/parser.c`（`tree-sitter generate` 的输出，可用 `TREE_SITTER_CAIRO_SRC`
//! 指定其他目录）存在时，build.rs 会编译并链接它，`LANGUAGE` 随之可用；否则
//! [`grammar()`] 返回一个空语法，需要通过动态库（见 [`crate::library`]）加载 Cairo。
//!
//! 本仓库不附带生成的解析器。从上游 tree-sitter-cairo 的 `grammar.js` 生成：
//!
//! ```text
//! mkdir -p grammar && cp /path/to/tree-sitter-cairo/grammar.js grammar/
//! cd grammar && tree-sitter generate      # 写出 grammar/src/parser.c 与 src/tree_sitter/
//! cd .. && cargo test                     # 启用 cfg(cairo_parser) 下的 Cairo 测试
//! ```
//!
//! 也可以 `tree-sitter build -o libtree-sitter-cairo.so`，再用
//! `grammar-smoke check --library libtree-sitter-cairo.so` 或 `TREE_SITTER_CAIRO_LIB` 检查。

use crate::provider::StaticGrammar;

pub const NAME: &str = "cairo";
pub const DISPLAY_NAME: &str = "Cairo";

/// 指向已编译 Cairo 语法动态库的环境变量
pub const LIBRARY_ENV: &str = "TREE_SITTER_CAIRO_LIB";

#[cfg(cairo_parser)]
extern "C" {
    fn tree_sitter_cairo() -> *const ();
}

/// Cairo 的 tree-sitter 语言入口
#[cfg(cairo_parser)]
pub const LANGUAGE: tree_sitter_language::LanguageFn =
    unsafe { tree_sitter_language::LanguageFn::from_raw(tree_sitter_cairo) };

/// 生成的 Cairo 解析器是否已链接进本二进制
pub const fn is_linked() -> bool {
    cfg!(cairo_parser)
}

#[cfg(cairo_parser)]
const GRAMMAR: StaticGrammar = StaticGrammar::new(NAME, DISPLAY_NAME, LANGUAGE);

#[cfg(not(cairo_parser))]
const GRAMMAR: StaticGrammar = StaticGrammar::absent(NAME, DISPLAY_NAME);

/// Cairo 语法提供者
pub const fn grammar() -> StaticGrammar {
    GRAMMAR
}
