//! Script lint rules.
//!
//! A small set of checks run over the parsed AST of every first-party script.
//! Severity depends on the build mode: everything is a warning during
//! development, while production promotes a configured subset to errors.

use std::fmt;
use std::path::{Path, PathBuf};

use oxc::ast::ast::{
    CallExpression, DebuggerStatement, Expression, MemberExpression, Program,
    VariableDeclaration, VariableDeclarationKind,
};
use oxc::ast_visit::{Visit, walk};

use crate::config::LintConfig;

use super::context::BuildMode;

/// Available lint rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LintRule {
    NoConsole,
    NoDebugger,
    NoAlert,
    NoVar,
}

impl LintRule {
    pub fn name(self) -> &'static str {
        match self {
            LintRule::NoConsole => "no-console",
            LintRule::NoDebugger => "no-debugger",
            LintRule::NoAlert => "no-alert",
            LintRule::NoVar => "no-var",
        }
    }

    fn message(self) -> &'static str {
        match self {
            LintRule::NoConsole => "unexpected console statement",
            LintRule::NoDebugger => "unexpected 'debugger' statement",
            LintRule::NoAlert => "unexpected alert",
            LintRule::NoVar => "unexpected var, use let or const instead",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintDiagnostic {
    pub rule: LintRule,
    /// Source-relative path of the script
    pub path: PathBuf,
    /// 1-based line
    pub line: usize,
    /// 1-based column (in characters)
    pub column: usize,
}

impl fmt::Display for LintDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} ({})",
            self.path.display(),
            self.line,
            self.column,
            self.rule.message(),
            self.rule.name()
        )
    }
}

/// Decides which rules run and how loud they are.
#[derive(Debug, Clone)]
pub struct LintPolicy {
    mode: BuildMode,
    disabled: Vec<String>,
    fatal_in_production: Vec<String>,
}

impl LintPolicy {
    pub fn new(config: &LintConfig, mode: BuildMode) -> Self {
        Self {
            mode,
            disabled: config.disabled.clone(),
            fatal_in_production: config.fatal_in_production.clone(),
        }
    }

    pub fn is_enabled(&self, rule: LintRule) -> bool {
        !self.disabled.iter().any(|name| name == rule.name())
    }

    pub fn severity(&self, rule: LintRule) -> Severity {
        if self.mode.is_production() && self.fatal_in_production.iter().any(|n| n == rule.name()) {
            Severity::Error
        } else {
            Severity::Warning
        }
    }
}

/// Run every lint rule over a parsed program.
///
/// Disabled rules are filtered out by the caller via [`LintPolicy`];
/// diagnostics come back in source order.
pub fn lint_program(program: &Program<'_>, source_text: &str, path: &Path) -> Vec<LintDiagnostic> {
    let mut visitor = LintVisitor {
        source_text,
        path,
        diagnostics: Vec::new(),
    };
    visitor.visit_program(program);
    visitor.diagnostics.sort_by_key(|d| (d.line, d.column));
    visitor.diagnostics
}

struct LintVisitor<'s> {
    source_text: &'s str,
    path: &'s Path,
    diagnostics: Vec<LintDiagnostic>,
}

impl LintVisitor<'_> {
    fn report(&mut self, rule: LintRule, offset: u32) {
        let (line, column) = line_column(self.source_text, offset as usize);
        self.diagnostics.push(LintDiagnostic {
            rule,
            path: self.path.to_path_buf(),
            line,
            column,
        });
    }
}

impl<'a> Visit<'a> for LintVisitor<'_> {
    fn visit_debugger_statement(&mut self, it: &DebuggerStatement) {
        self.report(LintRule::NoDebugger, it.span.start);
    }

    fn visit_member_expression(&mut self, it: &MemberExpression<'a>) {
        if let Expression::Identifier(object) = it.object()
            && object.name.as_str() == "console"
        {
            self.report(LintRule::NoConsole, object.span.start);
        }
        walk::walk_member_expression(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &it.callee
            && matches!(callee.name.as_str(), "alert" | "confirm" | "prompt")
        {
            self.report(LintRule::NoAlert, it.span.start);
        }
        walk::walk_call_expression(self, it);
    }

    fn visit_variable_declaration(&mut self, it: &VariableDeclaration<'a>) {
        if it.kind == VariableDeclarationKind::Var {
            self.report(LintRule::NoVar, it.span.start);
        }
        walk::walk_variable_declaration(self, it);
    }
}

/// Convert a byte offset into a 1-based (line, column) pair.
pub fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc::allocator::Allocator;
    use oxc::parser::Parser;
    use oxc::span::SourceType;

    fn lint(source: &str) -> Vec<LintDiagnostic> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
        assert!(ret.errors.is_empty());
        lint_program(&ret.program, source, Path::new("js/app.js"))
    }

    #[test]
    fn test_line_column() {
        let src = "a\nbc\nd";
        assert_eq!(line_column(src, 0), (1, 1));
        assert_eq!(line_column(src, 3), (2, 2));
        assert_eq!(line_column(src, 5), (3, 1));
    }

    #[test]
    fn test_console_call_and_reference() {
        let diagnostics = lint("console.log('x');\nstart().then(console.log);\n");
        let rules: Vec<_> = diagnostics.iter().map(|d| d.rule).collect();
        assert_eq!(rules, vec![LintRule::NoConsole, LintRule::NoConsole]);
        assert_eq!((diagnostics[1].line, diagnostics[1].column), (2, 14));
    }

    #[test]
    fn test_debugger_alert_var() {
        let diagnostics = lint("var a = 1;\ndebugger;\nalert(a);\n");
        let rules: Vec<_> = diagnostics.iter().map(|d| d.rule).collect();
        assert_eq!(
            rules,
            vec![LintRule::NoVar, LintRule::NoDebugger, LintRule::NoAlert]
        );
    }

    #[test]
    fn test_clean_code_has_no_diagnostics() {
        assert!(lint("const a = 1;\nlet b = a + 1;\nexport { b };\n").is_empty());
    }

    #[test]
    fn test_display_includes_location() {
        let diagnostics = lint("\n  debugger;\n");
        assert_eq!(
            diagnostics[0].to_string(),
            "js/app.js:2:3: unexpected 'debugger' statement (no-debugger)"
        );
    }

    #[test]
    fn test_policy_severity_by_mode() {
        let config = LintConfig::default();
        let dev = LintPolicy::new(&config, BuildMode::Development);
        let prod = LintPolicy::new(&config, BuildMode::Production);

        assert_eq!(dev.severity(LintRule::NoConsole), Severity::Warning);
        assert_eq!(prod.severity(LintRule::NoConsole), Severity::Error);
        assert_eq!(prod.severity(LintRule::NoDebugger), Severity::Error);
        assert_eq!(prod.severity(LintRule::NoVar), Severity::Warning);
    }

    #[test]
    fn test_policy_disabled_rules() {
        let config = LintConfig {
            disabled: vec!["no-var".into()],
            ..LintConfig::default()
        };
        let policy = LintPolicy::new(&config, BuildMode::Production);
        assert!(!policy.is_enabled(LintRule::NoVar));
        assert!(policy.is_enabled(LintRule::NoConsole));
    }
}
