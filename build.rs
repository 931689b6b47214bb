use std::env;
use std::path::PathBuf;

/// 生成的 Cairo 解析器源码目录（在 grammar/ 下对上游 grammar.js 运行 `tree-sitter generate`，见 src/cairo.rs）
const DEFAULT_CAIRO_SRC: &str = "grammar/src";

fn main() {
    println!("cargo:rustc-check-cfg=cfg(cairo_parser)");
    println!("cargo:rerun-if-env-changed=TREE_SITTER_CAIRO_SRC");

    let src_dir = env::var_os("TREE_SITTER_CAIRO_SRC")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CAIRO_SRC));
    let parser_path = src_dir.join("parser.c");
    println!("cargo:rerun-if-changed={}", parser_path.display());

    // 没有生成的解析器时不链接 Cairo，cairo::grammar() 返回空句柄
    if !parser_path.is_file() {
        return;
    }

    let mut build = cc::Build::new();
    build
        .std("c11")
        .include(&src_dir)
        .file(&parser_path)
        .flag_if_supported("-Wno-unused-parameter")
        .flag_if_supported("-Wno-unused-but-set-variable")
        .flag_if_supported("-Wno-trigraphs");

    let scanner_path = src_dir.join("scanner.c");
    if scanner_path.is_file() {
        println!("cargo:rerun-if-changed={}", scanner_path.display());
        build.file(&scanner_path);
    }

    build.compile("tree-sitter-cairo");
    println!("cargo:rustc-cfg=cairo_parser");
}
