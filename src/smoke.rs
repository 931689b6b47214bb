use crate::loader::{GrammarLoadError, LanguageLoader, LoadedLanguage, ParseSummary};
use crate::provider::GrammarProvider;
use serde::Serialize;
use std::error::Error as _;

// ── 单个用例 ──────────────────────────────────────────────────────────────────

/// 用例状态：NotRun → Passed | Failed，不重试
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    NotRun,
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub name: String,
    pub status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(rename = "abiVersion", skip_serializing_if = "Option::is_none")]
    pub abi_version: Option<usize>,
    #[serde(rename = "nodeKindCount", skip_serializing_if = "Option::is_none")]
    pub node_kind_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<ParseSummary>,
}

impl CaseResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CaseStatus::NotRun,
            message: None,
            detail: None,
            abi_version: None,
            node_kind_count: None,
            artifact: None,
            sample: None,
        }
    }

    /// 直接由加载错误构造失败用例（如动态库无法打开）
    pub fn from_error(name: impl Into<String>, err: &GrammarLoadError) -> Self {
        let mut case = Self::new(name);
        case.fail(err.to_string(), err.source().map(|e| e.to_string()));
        case
    }

    pub fn passed(&self) -> bool {
        self.status == CaseStatus::Passed
    }

    fn pass(&mut self, loaded: &LoadedLanguage) {
        self.status = CaseStatus::Passed;
        self.abi_version = Some(loaded.abi_version());
        self.node_kind_count = Some(loaded.node_kind_count());
    }

    fn fail(&mut self, message: String, detail: Option<String>) {
        self.status = CaseStatus::Failed;
        self.message = Some(message);
        self.detail = detail;
    }
}

/// 运行选项
#[derive(Debug, Clone, Default)]
pub struct SmokeOptions {
    /// 加载成功后解析的样例源码
    pub sample: Option<String>,
    /// 样例解析出现语法错误时判定用例失败
    pub strict: bool,
}

// ── 冒烟测试 ──────────────────────────────────────────────────────────────────

/// 取句柄并交给加载器
pub fn can_load_grammar(
    provider: &dyn GrammarProvider,
    loader: &dyn LanguageLoader,
) -> Result<LoadedLanguage, GrammarLoadError> {
    loader.load(&provider.language())
}

/// 运行单个语法的冒烟测试，失败不会中断调用方
pub fn run_case(provider: &dyn GrammarProvider, loader: &dyn LanguageLoader, options: &SmokeOptions) -> CaseResult {
    let mut case = CaseResult::new(provider.name());
    case.artifact = provider.artifact();

    let loaded = match can_load_grammar(provider, loader) {
        Ok(loaded) => loaded,
        Err(err) => {
            case.fail(err.to_string(), err.source().map(|e| e.to_string()));
            return case;
        }
    };
    case.pass(&loaded);

    if let Some(source) = &options.sample {
        case.sample = loaded.parse(source);
        let dirty = case.sample.as_ref().map(|s| s.has_error).unwrap_or(true);
        if options.strict && dirty {
            let detail = case
                .sample
                .as_ref()
                .and_then(|s| s.first_error)
                .map(|p| format!("first error at {}:{}", p.line, p.column));
            case.fail(
                format!("Sample does not parse cleanly with {} grammar", provider.display_name()),
                detail,
            );
        }
    }

    case
}

/// 依次运行所有语法，保持输入顺序
pub fn run_all(providers: &[&dyn GrammarProvider], loader: &dyn LanguageLoader, options: &SmokeOptions) -> SmokeReport {
    let mut report = SmokeReport::default();
    for provider in providers {
        report.push(run_case(*provider, loader, options));
    }
    report
}

// ── 汇总报告 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct SmokeReport {
    passed: usize,
    failed: usize,
    cases: Vec<CaseResult>,
}

impl SmokeReport {
    pub fn push(&mut self, case: CaseResult) {
        match case.status {
            CaseStatus::Passed => self.passed += 1,
            CaseStatus::Failed => self.failed += 1,
            CaseStatus::NotRun => {}
        }
        self.cases.push(case);
    }

    pub fn cases(&self) -> &[CaseResult] {
        &self.cases
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// 进程退出码：任一用例失败为 1
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            1
        } else {
            0
        }
    }

    /// 纯文本报告
    pub fn render_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.cases.len() + 1);
        for case in &self.cases {
            let line = match case.status {
                CaseStatus::Passed => {
                    let mut line = format!(
                        "PASS  {} (ABI {}, {} node kinds)",
                        case.name,
                        case.abi_version.unwrap_or_default(),
                        case.node_kind_count.unwrap_or_default()
                    );
                    if let Some(sample) = &case.sample {
                        line.push_str(if sample.has_error {
                            ", sample has syntax errors"
                        } else {
                            ", sample ok"
                        });
                    }
                    line
                }
                CaseStatus::Failed => {
                    let mut line = format!("FAIL  {}: {}", case.name, case.message.as_deref().unwrap_or(""));
                    if let Some(detail) = &case.detail {
                        line.push_str(&format!(" ({detail})"));
                    }
                    line
                }
                CaseStatus::NotRun => format!("SKIP  {}", case.name),
            };
            lines.push(line);
        }
        lines.push(format!("{} passed, {} failed", self.passed, self.failed));
        lines.join("\n")
    }
}
