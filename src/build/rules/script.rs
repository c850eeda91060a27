//! Script modules.
//!
//! Module syntax is compiled away here. Imports of other scripts and
//! stylesheets become graph edges, and imports of data and images become
//! constants. First-party modules are wrapped into registry factories (see
//! [`crate::build::runtime`]) that read imports through `__require` and
//! publish their exports. Vendored scripts stay classic scripts: their
//! `export` keywords are dropped and their declarations become globals.

use std::path::{Path, PathBuf};

use oxc::allocator::Allocator;
use oxc::ast::ast::{
    Declaration, ExportAllDeclaration, ExportDefaultDeclaration, ExportDefaultDeclarationKind,
    ExportNamedDeclaration, ImportDeclaration, ImportDeclarationSpecifier, Statement,
};
use oxc::codegen::Codegen;
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::{GetSpan, SourceType};
use oxc::transformer::{HelperLoaderMode, TransformOptions, Transformer};

use crate::build::asset::{
    AssetPayload, AssetReference, MimeClass, RASTER_EXTENSIONS, ScriptModule, TransformedAsset,
};
use crate::build::context::BuildContext;
use crate::build::lint::{line_column, lint_program};
use crate::build::paths::{normalize, to_url};
use crate::build::runtime::{EXPORTS, REGISTRY, define_module, js_string, require_call};
use crate::build::source::SourceFile;

use super::{RuleError, TransformRule, has_extension, is_under};

const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs"];
const STYLE_EXTENSIONS: &[&str] = &["css", "scss", "sass"];

pub struct ScriptRule {
    scripts_dir: PathBuf,
    vendor_dir: PathBuf,
    target: String,
}

impl ScriptRule {
    pub fn new(scripts_dir: PathBuf, vendor_dir: PathBuf, target: String) -> Self {
        Self {
            scripts_dir,
            vendor_dir,
            target,
        }
    }

    fn transpile(&self, code: &str, path: &Path) -> Result<String, RuleError> {
        let to_error = |message: String| RuleError::Transpile {
            path: path.to_path_buf(),
            message,
        };

        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, code, SourceType::mjs()).parse();
        if let Some(error) = ret.errors.first() {
            return Err(to_error(error.to_string()));
        }
        let mut program = ret.program;

        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();

        let mut options = TransformOptions::from_target(&self.target).map_err(|e| to_error(e.to_string()))?;
        // Helpers are not inlined per module; bundles load them once.
        options.helper_loader.mode = HelperLoaderMode::External;

        let ret = Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
        if !ret.errors.is_empty() {
            let message = ret
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(to_error(message));
        }

        Ok(Codegen::new().build(&program).code)
    }
}

impl TransformRule for ScriptRule {
    fn name(&self) -> &'static str {
        "script"
    }

    fn matches(&self, path: &Path) -> bool {
        (is_under(path, &self.scripts_dir) || is_under(path, &self.vendor_dir))
            && has_extension(path, SCRIPT_EXTENSIONS)
    }

    fn transform(
        &self,
        file: &SourceFile,
        bytes: Vec<u8>,
        ctx: &BuildContext,
    ) -> Result<Option<TransformedAsset>, RuleError> {
        let path = &file.relative;
        let source = String::from_utf8(bytes).map_err(|_| RuleError::Encoding {
            path: path.clone(),
        })?;
        let vendored = is_vendored(path, &self.vendor_dir);

        let source_type = if vendored {
            SourceType::unambiguous()
        } else {
            SourceType::mjs()
        };
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, &source, source_type).parse();
        if let Some(error) = ret.errors.first() {
            let offset = error
                .labels
                .as_ref()
                .and_then(|labels| labels.first())
                .map(|label| label.offset())
                .unwrap_or(0);
            let (line, column) = line_column(&source, offset);
            return Err(RuleError::ScriptSyntax {
                path: path.clone(),
                line,
                column,
                message: error.to_string(),
            });
        }

        let diagnostics = if vendored {
            Vec::new()
        } else {
            lint_program(&ret.program, &source, path)
        };

        let mut rewriter = ModuleRewriter {
            path,
            source: &source,
            ctx,
            vendor_dir: &self.vendor_dir,
            scope: if vendored { Scope::Global } else { Scope::Module },
            edits: Vec::new(),
            exports: Vec::new(),
            script_deps: Vec::new(),
            style_deps: Vec::new(),
        };
        for statement in &ret.program.body {
            rewriter.visit_statement(statement)?;
        }
        let ModuleRewriter {
            edits,
            exports,
            script_deps,
            style_deps,
            ..
        } = rewriter;

        let code = apply_edits(&source, edits);
        let code = if vendored {
            code
        } else {
            define_module(path, &self.transpile(&code, path)?, &exports)
        };

        let reference = AssetReference::new(path.clone(), None, code.as_bytes(), MimeClass::Script);
        Ok(Some(TransformedAsset {
            reference,
            payload: AssetPayload::Script(ScriptModule {
                code,
                script_deps,
                style_deps,
                vendored,
                diagnostics,
            }),
        }))
    }
}

// =============================================================================
// Module syntax rewriting
// =============================================================================

/// Replace `source[start..end]` with `replacement`.
struct Edit {
    start: u32,
    end: u32,
    replacement: String,
}

/// How a module's top-level names are exposed.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// First-party code: a registry factory with its own scope
    Module,
    /// Vendored code: a classic script whose declarations are globals
    Global,
}

struct ModuleRewriter<'r> {
    path: &'r Path,
    source: &'r str,
    ctx: &'r BuildContext,
    vendor_dir: &'r Path,
    scope: Scope,
    edits: Vec<Edit>,
    /// Exported name and the expression it reads
    exports: Vec<(String, String)>,
    script_deps: Vec<PathBuf>,
    style_deps: Vec<PathBuf>,
}

impl ModuleRewriter<'_> {
    fn visit_statement(&mut self, statement: &Statement<'_>) -> Result<(), RuleError> {
        match statement {
            Statement::ImportDeclaration(decl) => self.rewrite_import(decl),
            Statement::ExportNamedDeclaration(decl) => self.rewrite_named_export(decl),
            Statement::ExportDefaultDeclaration(decl) => self.rewrite_default_export(decl),
            Statement::ExportAllDeclaration(decl) => self.rewrite_export_all(decl),
            _ => Ok(()),
        }
    }

    fn rewrite_import(&mut self, decl: &ImportDeclaration<'_>) -> Result<(), RuleError> {
        let specifier = decl.source.value.as_str();
        let resolved = self.resolve(specifier)?;
        let specifiers: &[ImportDeclarationSpecifier<'_>] = match &decl.specifiers {
            Some(specifiers) => specifiers,
            None => &[],
        };

        let replacement = if has_extension(&resolved, SCRIPT_EXTENSIONS) {
            let replacement = self.bind_script(specifier, &resolved, specifiers)?;
            self.add_script_dep(resolved);
            replacement
        } else if has_extension(&resolved, STYLE_EXTENSIONS) {
            if !self.style_deps.contains(&resolved) {
                self.style_deps.push(resolved);
            }
            String::new()
        } else if has_extension(&resolved, &["json"]) {
            let json = self.read_json(specifier, &resolved)?;
            bind_value(specifiers, &json)
        } else if has_extension(&resolved, RASTER_EXTENSIONS) || has_extension(&resolved, &["svg"]) {
            bind_value(specifiers, &js_string(&to_url(&resolved)))
        } else {
            return Err(self.import_error(specifier, "unsupported module type"));
        };

        self.replace(decl.span.start, decl.span.end, replacement);
        Ok(())
    }

    /// Bind the names imported from another script.
    ///
    /// Registry modules are read through `__require`. Vendored scripts
    /// define globals, so only named imports make sense for them.
    fn bind_script(
        &self,
        specifier: &str,
        resolved: &Path,
        specifiers: &[ImportDeclarationSpecifier<'_>],
    ) -> Result<String, RuleError> {
        if self.scope == Scope::Global || is_vendored(resolved, self.vendor_dir) {
            let mut aliases = Vec::new();
            for s in specifiers {
                let ImportDeclarationSpecifier::ImportSpecifier(named) = s else {
                    return Err(self.import_error(
                        specifier,
                        "vendored scripts define globals; use named imports",
                    ));
                };
                let imported = named.imported.name();
                if imported != named.local.name {
                    aliases.push(format!("const {} = {};", named.local.name, imported));
                }
            }
            return Ok(aliases.join("\n"));
        }

        let require = require_call(resolved);
        if specifiers.is_empty() {
            return Ok(format!("{require};"));
        }
        let mut out = Vec::new();
        let mut fields = Vec::new();
        for s in specifiers {
            match s {
                ImportDeclarationSpecifier::ImportDefaultSpecifier(d) => {
                    out.push(format!("const {} = {require}.default;", d.local.name));
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(n) => {
                    out.push(format!("const {} = {require};", n.local.name));
                }
                ImportDeclarationSpecifier::ImportSpecifier(named) => {
                    fields.push(field(named.imported.name().as_str(), named.local.name.as_str()));
                }
            }
        }
        if !fields.is_empty() {
            out.push(format!("const {{ {} }} = {require};", fields.join(", ")));
        }
        Ok(out.join("\n"))
    }

    fn rewrite_named_export(&mut self, decl: &ExportNamedDeclaration<'_>) -> Result<(), RuleError> {
        if let Some(declaration) = &decl.declaration {
            self.remove(decl.span.start, declaration.span().start);
            for name in declared_names(declaration) {
                self.export(name.clone(), name);
            }
            return Ok(());
        }

        let Some(source) = &decl.source else {
            let mut aliases = Vec::new();
            for s in &decl.specifiers {
                let (local, exported) = (s.local.name().to_string(), s.exported.name().to_string());
                if self.scope == Scope::Global && local != exported {
                    aliases.push(format!("const {exported} = {local};"));
                }
                self.export(exported, local);
            }
            self.replace(decl.span.start, decl.span.end, aliases.join("\n"));
            return Ok(());
        };

        let resolved = self.resolve(source.value.as_str())?;
        let replacement = if self.scope == Scope::Module && !is_vendored(&resolved, self.vendor_dir) {
            let require = require_call(&resolved);
            for s in &decl.specifiers {
                let expr = format!("{require}[{}]", js_string(s.local.name().as_str()));
                self.export(s.exported.name().to_string(), expr);
            }
            format!("{require};")
        } else {
            let mut aliases = Vec::new();
            for s in &decl.specifiers {
                let (local, exported) = (s.local.name().to_string(), s.exported.name().to_string());
                if self.scope == Scope::Global && local != exported {
                    aliases.push(format!("const {exported} = {local};"));
                }
                self.export(exported, local);
            }
            aliases.join("\n")
        };
        self.add_script_dep(resolved);
        self.replace(decl.span.start, decl.span.end, replacement);
        Ok(())
    }

    fn rewrite_default_export(&mut self, decl: &ExportDefaultDeclaration<'_>) -> Result<(), RuleError> {
        let name = match &decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                function.id.as_ref().map(|id| id.name.to_string())
            }
            ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                class.id.as_ref().map(|id| id.name.to_string())
            }
            _ => None,
        };

        match name {
            Some(name) => {
                self.remove(decl.span.start, decl.declaration.span().start);
                self.export("default".to_string(), name);
            }
            None if self.scope == Scope::Module => {
                let span = decl.declaration.span();
                let value = &self.source[span.start as usize..span.end as usize];
                let replacement = format!("const {DEFAULT_BINDING} = {value};");
                self.replace(decl.span.start, decl.span.end, replacement);
                self.export("default".to_string(), DEFAULT_BINDING.to_string());
            }
            None => {
                return Err(RuleError::Transpile {
                    path: self.path.to_path_buf(),
                    message: "vendored default exports must be named functions or classes".to_string(),
                });
            }
        }
        Ok(())
    }

    fn rewrite_export_all(&mut self, decl: &ExportAllDeclaration<'_>) -> Result<(), RuleError> {
        let specifier = decl.source.value.as_str();
        let resolved = self.resolve(specifier)?;
        if self.scope == Scope::Global || is_vendored(&resolved, self.vendor_dir) {
            // a vendored script's globals are already visible everywhere
            if decl.exported.is_some() {
                return Err(self.import_error(specifier, "vendored scripts have no namespace to re-export"));
            }
            self.add_script_dep(resolved);
            self.remove(decl.span.start, decl.span.end);
            return Ok(());
        }

        let require = require_call(&resolved);
        let replacement = match &decl.exported {
            Some(exported) => {
                self.export(exported.name().to_string(), require.clone());
                format!("{require};")
            }
            None => format!("{REGISTRY}.exportAll({EXPORTS}, {require});"),
        };
        self.add_script_dep(resolved);
        self.replace(decl.span.start, decl.span.end, replacement);
        Ok(())
    }

    fn resolve(&self, specifier: &str) -> Result<PathBuf, RuleError> {
        let resolved = resolve_specifier(specifier, self.path, self.vendor_dir)
            .ok_or_else(|| self.import_error(specifier, "path escapes the source root"))?;
        if !self.ctx.source_path(&resolved).is_file() {
            return Err(self.import_error(
                specifier,
                &format!("cannot find {}", resolved.display()),
            ));
        }
        Ok(resolved)
    }

    fn read_json(&self, specifier: &str, resolved: &Path) -> Result<String, RuleError> {
        let text = std::fs::read_to_string(self.ctx.source_path(resolved))
            .map_err(|e| self.import_error(specifier, &e.to_string()))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| self.import_error(specifier, &format!("invalid JSON: {e}")))?;
        Ok(value.to_string())
    }

    fn export(&mut self, name: String, expr: String) {
        if self.scope == Scope::Module {
            self.exports.push((name, expr));
        }
    }

    fn add_script_dep(&mut self, resolved: PathBuf) {
        if !self.script_deps.contains(&resolved) {
            self.script_deps.push(resolved);
        }
    }

    fn remove(&mut self, start: u32, end: u32) {
        self.replace(start, end, String::new());
    }

    fn replace(&mut self, start: u32, end: u32, replacement: String) {
        self.edits.push(Edit {
            start,
            end,
            replacement,
        });
    }

    fn import_error(&self, specifier: &str, message: &str) -> RuleError {
        RuleError::Import {
            path: self.path.to_path_buf(),
            specifier: specifier.to_string(),
            message: message.to_string(),
        }
    }
}

/// Local name of an anonymous default export.
const DEFAULT_BINDING: &str = "__default";

/// Names a top-level declaration binds.
fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(variables) => variables
            .declarations
            .iter()
            .flat_map(|d| d.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        other => other.id().map(|id| id.name.to_string()).into_iter().collect(),
    }
}

/// One destructuring field binding `imported` to `local`.
fn field(imported: &str, local: &str) -> String {
    if imported == local {
        imported.to_string()
    } else {
        format!("{}: {local}", js_string(imported))
    }
}

/// Bind an inlined value to the names an import declaration introduces.
fn bind_value(specifiers: &[ImportDeclarationSpecifier<'_>], value: &str) -> String {
    let mut whole = Vec::new();
    let mut fields = Vec::new();
    for s in specifiers {
        match s {
            ImportDeclarationSpecifier::ImportDefaultSpecifier(d) => whole.push(d.local.name.to_string()),
            ImportDeclarationSpecifier::ImportNamespaceSpecifier(n) => whole.push(n.local.name.to_string()),
            ImportDeclarationSpecifier::ImportSpecifier(named) => {
                fields.push(field(named.imported.name().as_str(), named.local.name.as_str()));
            }
        }
    }

    let mut out: Vec<String> = whole
        .iter()
        .map(|name| format!("const {name} = {value};"))
        .collect();
    if !fields.is_empty() {
        out.push(format!("const {{ {} }} = {value};", fields.join(", ")));
    }
    out.join("\n")
}

/// Third-party code is bundled as-is: no lint, no transpilation, no registry.
fn is_vendored(path: &Path, vendor_dir: &Path) -> bool {
    is_under(path, vendor_dir) || path.components().any(|c| c.as_os_str() == "node_modules")
}

fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| e.start);
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for edit in edits {
        let (start, end) = (edit.start as usize, edit.end as usize);
        if start < cursor {
            continue;
        }
        out.push_str(&source[cursor..start]);
        out.push_str(&edit.replacement);
        cursor = end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Resolve an import specifier to a source-relative path.
///
/// - `./x` and `../x` resolve against the importing file's directory
/// - `@/x` resolves against the source root
/// - bare specifiers resolve into the vendor directory
///
/// A missing extension defaults to `.js`. Returns `None` when the result
/// would escape the source root.
fn resolve_specifier(specifier: &str, importer: &Path, vendor_dir: &Path) -> Option<PathBuf> {
    let joined = if specifier.starts_with("./") || specifier.starts_with("../") {
        importer.parent().unwrap_or(Path::new("")).join(specifier)
    } else if let Some(rest) = specifier.strip_prefix("@/") {
        PathBuf::from(rest)
    } else if let Some(rest) = specifier.strip_prefix('/') {
        PathBuf::from(rest)
    } else {
        vendor_dir.join(specifier)
    };

    let mut resolved = normalize(&joined)?;
    if resolved.extension().is_none() {
        resolved.set_extension("js");
    }
    Some(resolved)
}
