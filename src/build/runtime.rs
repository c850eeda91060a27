//! Module registry for bundled scripts.
//!
//! Every first-party module is compiled into a factory registered under its
//! source-relative path, so its top-level names stay private to it. A page
//! loads chunks as classic scripts; the first chunk that needs the registry
//! installs it on the global object and later chunks reuse it. Entry chunks
//! end by requiring their entry modules, which runs each module once, after
//! its dependencies.

use std::path::Path;

use super::paths::to_url;

/// Global object property holding the registry.
pub const REGISTRY: &str = "__assetline";

/// Name of the exports object inside a module factory.
pub const EXPORTS: &str = "__exports";

/// Name of the require function inside a module factory.
pub const REQUIRE: &str = "__require";

/// Installs the registry unless an earlier chunk already did.
pub const PRELUDE: &str = r#"(function (g) {
  if (g.__assetline) return;
  var factories = {};
  var cache = {};
  function require(id) {
    var cached = cache[id];
    if (cached) return cached.exports;
    var factory = factories[id];
    if (!factory) throw new Error("module not found: " + id);
    var module = (cache[id] = { exports: {} });
    factory(module.exports, require);
    return module.exports;
  }
  g.__assetline = {
    define: function (id, factory) {
      factories[id] = factory;
    },
    require: require,
    exports: function (exports, getters) {
      Object.keys(getters).forEach(function (name) {
        Object.defineProperty(exports, name, { enumerable: true, get: getters[name] });
      });
    },
    exportAll: function (exports, from) {
      Object.keys(from).forEach(function (name) {
        if (name === "default" || Object.prototype.hasOwnProperty.call(exports, name)) return;
        Object.defineProperty(exports, name, {
          enumerable: true,
          get: function () {
            return from[name];
          },
        });
      });
    },
  };
})(typeof self !== "undefined" ? self : this);
"#;

/// Registry key of a module.
pub fn module_id(path: &Path) -> String {
    to_url(path)
}

/// A string literal usable in generated code.
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// `__require("id")` for use inside a module factory.
pub fn require_call(path: &Path) -> String {
    format!("{REQUIRE}({})", js_string(&module_id(path)))
}

/// Run an entry module from an entry chunk.
pub fn require_entry(path: &Path) -> String {
    format!("{REGISTRY}.require({});\n", js_string(&module_id(path)))
}

/// Wrap a module body into a registry definition.
///
/// `exports` pairs each exported name with the expression it reads; the
/// getters are installed before the body runs so importers in a cycle see
/// the names.
pub fn define_module(path: &Path, body: &str, exports: &[(String, String)]) -> String {
    let mut out = format!(
        "{REGISTRY}.define({}, function ({EXPORTS}, {REQUIRE}) {{\n\"use strict\";\n",
        js_string(&module_id(path))
    );
    if !exports.is_empty() {
        let getters = exports
            .iter()
            .map(|(name, expr)| format!("{}: function () {{ return {expr}; }}", js_string(name)))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("{REGISTRY}.exports({EXPORTS}, {{ {getters} }});\n"));
    }
    out.push_str(body.trim_end());
    out.push_str("\n});\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_module() {
        let code = define_module(
            Path::new("js/util.js"),
            "function twice(x) { return x * 2; }\n",
            &[("twice".to_string(), "twice".to_string())],
        );
        assert!(code.starts_with("__assetline.define(\"js/util.js\", function (__exports, __require) {"));
        assert!(code.contains("__assetline.exports(__exports, { \"twice\": function () { return twice; } });"));
        assert!(code.trim_end().ends_with("});"));
    }

    #[test]
    fn test_define_without_exports() {
        let code = define_module(Path::new("js/main.js"), "go();", &[]);
        assert!(!code.contains("__assetline.exports("));
        assert!(code.contains("go();"));
    }

    #[test]
    fn test_require_helpers() {
        assert_eq!(require_call(Path::new("js/a.js")), "__require(\"js/a.js\")");
        assert_eq!(require_entry(Path::new("js/main.js")), "__assetline.require(\"js/main.js\");\n");
    }
}
