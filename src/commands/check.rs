use anyhow::{bail, Context};
use clap::Args;
use grammar_smoke::cairo;
use grammar_smoke::library::{self, grammar_name_from_path, LibraryError, SharedLibraryGrammar};
use grammar_smoke::loader::{GrammarLoadError, LoadFailure, TreeSitterLoader};
use grammar_smoke::provider::{self, GrammarProvider};
use grammar_smoke::smoke::{run_case, CaseResult, SmokeOptions, SmokeReport};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct CheckArgs {
    /// Grammar to check (repeatable); defaults to cairo
    #[arg(short, long = "grammar")]
    pub grammars: Vec<String>,
    /// Check every grammar linked into this binary
    #[arg(long)]
    pub all: bool,
    /// Grammar shared library to check, as PATH or NAME=PATH (repeatable)
    #[arg(long = "library")]
    pub libraries: Vec<String>,
    /// Check every grammar library found in this directory
    #[arg(long)]
    pub library_dir: Option<PathBuf>,
    /// Compiled Cairo grammar library used instead of the linked parser
    #[arg(long, env = cairo::LIBRARY_ENV)]
    pub cairo_library: Option<PathBuf>,
    /// Source file parsed with each grammar after it loads
    #[arg(long)]
    pub sample: Option<PathBuf>,
    /// Fail a grammar whose sample parse contains syntax errors
    #[arg(long, requires = "sample")]
    pub strict: bool,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: CheckArgs) {
    let report = match build_report(&args) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Serialization error: {e}");
                std::process::exit(1);
            }
        }
    } else {
        println!("{}", report.render_text());
    }

    std::process::exit(report.exit_code());
}

/// 待运行的用例：可运行的语法，或在打开阶段就已失败的动态库
enum Planned {
    Grammar(Box<dyn GrammarProvider>),
    Broken(CaseResult),
}

fn build_report(args: &CheckArgs) -> anyhow::Result<SmokeReport> {
    let options = SmokeOptions {
        sample: match &args.sample {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read sample '{}'", path.display()))?,
            ),
            None => None,
        },
        strict: args.strict,
    };

    let loader = TreeSitterLoader::new();
    let mut report = SmokeReport::default();
    for planned in plan(args)? {
        let case = match planned {
            Planned::Grammar(provider) => run_case(provider.as_ref(), &loader, &options),
            Planned::Broken(case) => case,
        };
        report.push(case);
    }
    Ok(report)
}

fn plan(args: &CheckArgs) -> anyhow::Result<Vec<Planned>> {
    let mut planned = Vec::new();
    // 已排入计划的语法名，同一语法只检查一次
    let mut seen: HashSet<String> = HashSet::new();

    let explicit = !args.grammars.is_empty() || !args.libraries.is_empty() || args.library_dir.is_some();
    let defaults = [cairo::NAME.to_string()];
    let names: &[String] = if !explicit && !args.all {
        &defaults
    } else {
        &args.grammars
    };

    if let Some(path) = &args.cairo_library {
        let selected = args.all || names.iter().any(|n| n.eq_ignore_ascii_case(cairo::NAME));
        if !selected {
            bail!(
                "a Cairo library was given ({} or --cairo-library) but cairo is not selected; add --grammar cairo or --all",
                cairo::LIBRARY_ENV
            );
        }
        // 指定的 Cairo 动态库取代内置的 Cairo 语法
        seen.insert(cairo::NAME.to_string());
        planned.push(open_library(path, cairo::NAME));
    }

    if args.all {
        for grammar in provider::bundled().into_iter().filter(|g| g.is_linked()) {
            if seen.insert(grammar.name().to_string()) {
                planned.push(Planned::Grammar(Box::new(grammar)));
            }
        }
    }

    for name in names {
        let name = name.to_lowercase();
        if seen.contains(&name) {
            continue;
        }
        match provider::find_bundled(&name) {
            Some(grammar) => planned.push(Planned::Grammar(Box::new(grammar))),
            None => bail!("unknown grammar '{}'; use --library to check a grammar library", name),
        }
        seen.insert(name);
    }

    for value in &args.libraries {
        let (name, path) = parse_library_arg(value)?;
        planned.push(open_library(&path, &name));
    }

    if let Some(dir) = &args.library_dir {
        if !dir.is_dir() {
            bail!("library directory '{}' does not exist", dir.display());
        }
        let found = library::discover(dir);
        if found.is_empty() {
            log::warn!("no grammar libraries found in {}", dir.display());
        }
        for lib in found {
            planned.push(open_library(&lib.path, &lib.name));
        }
    }

    Ok(planned)
}

fn open_library(path: &Path, name: &str) -> Planned {
    match SharedLibraryGrammar::open(path, name) {
        Ok(grammar) => Planned::Grammar(Box::new(grammar)),
        Err(e) => {
            let mut case = broken_case(name, e);
            case.artifact = library::fingerprint_file(path).ok();
            Planned::Broken(case)
        }
    }
}

fn broken_case(name: &str, err: LibraryError) -> CaseResult {
    let err = GrammarLoadError::new(library::display_name_for(name), LoadFailure::Library(err));
    CaseResult::from_error(name, &err)
}

/// `NAME=PATH` 或 `PATH`（语法名由文件名推断）
fn parse_library_arg(value: &str) -> anyhow::Result<(String, PathBuf)> {
    if let Some((name, path)) = value.split_once('=') {
        if name.is_empty() || path.is_empty() {
            bail!("invalid --library value '{}', expected NAME=PATH", value);
        }
        return Ok((name.to_lowercase(), PathBuf::from(path)));
    }
    let path = PathBuf::from(value);
    match grammar_name_from_path(&path) {
        Some(name) => Ok((name, path)),
        None => bail!(
            "cannot infer grammar name from '{}'; use NAME=PATH",
            value
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CheckArgs {
        CheckArgs {
            grammars: Vec::new(),
            all: false,
            libraries: Vec::new(),
            library_dir: None,
            cairo_library: None,
            sample: None,
            strict: false,
            json: false,
        }
    }

    fn planned_names(planned: &[Planned]) -> Vec<String> {
        planned
            .iter()
            .map(|p| match p {
                Planned::Grammar(g) => g.name().to_string(),
                Planned::Broken(case) => case.name.clone(),
            })
            .collect()
    }

    #[test]
    fn test_plan_all_skips_repeated_names() {
        let mut a = args();
        a.all = true;
        a.grammars = vec!["rust".to_string(), "Rust".to_string()];
        let names = planned_names(&plan(&a).unwrap());
        assert_eq!(names.iter().filter(|n| *n == "rust").count(), 1);
    }

    #[test]
    fn test_plan_cairo_library_replaces_cairo_in_all() {
        let mut a = args();
        a.all = true;
        a.cairo_library = Some(PathBuf::from("/nonexistent/cairo.so"));
        let planned = plan(&a).unwrap();
        let names = planned_names(&planned);
        assert_eq!(names[0], "cairo");
        assert_eq!(names.iter().filter(|n| *n == "cairo").count(), 1);
        assert!(matches!(planned[0], Planned::Broken(_)));
    }

    #[test]
    fn test_plan_cairo_library_requires_cairo_selected() {
        let mut a = args();
        a.grammars = vec!["rust".to_string()];
        a.cairo_library = Some(PathBuf::from("/nonexistent/cairo.so"));
        let err = plan(&a).err().expect("cairo library without cairo must be rejected");
        assert!(err.to_string().contains("cairo is not selected"));
    }

    #[test]
    fn test_plan_default_uses_cairo_library() {
        let mut a = args();
        a.cairo_library = Some(PathBuf::from("/nonexistent/cairo.so"));
        let planned = plan(&a).unwrap();
        assert_eq!(planned_names(&planned), vec!["cairo"]);
        assert!(matches!(planned[0], Planned::Broken(_)));
    }

    #[test]
    fn test_parse_library_arg_named() {
        let (name, path) = parse_library_arg("Cairo=/tmp/x.so").unwrap();
        assert_eq!(name, "cairo");
        assert_eq!(path, PathBuf::from("/tmp/x.so"));
    }

    #[test]
    fn test_parse_library_arg_inferred() {
        let (name, path) = parse_library_arg("/opt/libtree-sitter-cairo.so").unwrap();
        assert_eq!(name, "cairo");
        assert_eq!(path, PathBuf::from("/opt/libtree-sitter-cairo.so"));
    }

    #[test]
    fn test_parse_library_arg_invalid() {
        assert!(parse_library_arg("=/tmp/x.so").is_err());
        assert!(parse_library_arg("cairo=").is_err());
        assert!(parse_library_arg("/tmp/grammar.txt").is_err());
    }

    #[test]
    fn test_broken_case_message() {
        let err = LibraryError::Open {
            path: PathBuf::from("/tmp/cairo.so"),
            reason: "invalid ELF header".to_string(),
        };
        let case = broken_case("cairo", err);
        assert!(!case.passed());
        assert_eq!(case.message.as_deref(), Some("Error loading Cairo grammar"));
        assert!(case.detail.unwrap().contains("invalid ELF header"));
    }
}
