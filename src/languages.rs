//! Extension table and tree-sitter grammar lookup.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A language with a known extension mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    Rust,
    Go,
    CSharp,
    C,
    Cpp,
    Java,
    JavaScript,
    TypeScript,
}

impl Lang {
    pub const ALL: [Lang; 9] = [
        Lang::Python,
        Lang::Rust,
        Lang::Go,
        Lang::CSharp,
        Lang::C,
        Lang::Cpp,
        Lang::Java,
        Lang::JavaScript,
        Lang::TypeScript,
    ];

    /// Identifier stored in chunk metadata.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::CSharp => "csharp",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
        }
    }

    /// Returns `None` when the grammar's cargo feature is disabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[cfg(feature = "lang-csharp")]
            Self::CSharp => Some(tree_sitter_c_sharp::LANGUAGE.into()),
            #[cfg(feature = "lang-c")]
            Self::C => Some(tree_sitter_c::LANGUAGE.into()),
            #[cfg(feature = "lang-cpp")]
            Self::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            #[cfg(feature = "lang-java")]
            Self::Java => Some(tree_sitter_java::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension (case-insensitive).
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "py" | "pyi" => Some(Lang::Python),
        "rs" => Some(Lang::Rust),
        "go" => Some(Lang::Go),
        "cs" => Some(Lang::CSharp),
        "c" | "h" => Some(Lang::C),
        "cpp" | "hpp" | "cc" | "cxx" | "hxx" => Some(Lang::Cpp),
        "java" => Some(Lang::Java),
        "js" | "jsx" => Some(Lang::JavaScript),
        "ts" | "tsx" => Some(Lang::TypeScript),
        _ => None,
    }
}

/// Sorted ids of every language in the extension table.
#[must_use]
pub fn supported_languages() -> Vec<String> {
    let mut ids: Vec<String> = Lang::ALL.iter().map(|l| l.id().to_string()).collect();
    ids.sort();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_core_extensions() {
        let cases = [
            ("a.py", Lang::Python),
            ("a.pyi", Lang::Python),
            ("src/lib.rs", Lang::Rust),
            ("main.go", Lang::Go),
            ("Program.cs", Lang::CSharp),
            ("x.h", Lang::C),
            ("x.hxx", Lang::Cpp),
            ("x.cc", Lang::Cpp),
            ("App.java", Lang::Java),
            ("view.jsx", Lang::JavaScript),
            ("view.tsx", Lang::TypeScript),
        ];
        for (path, lang) in cases {
            assert_eq!(detect_language(Path::new(path)), Some(lang), "failed for {path}");
        }
    }

    #[test]
    fn detect_language_is_case_insensitive() {
        assert_eq!(detect_language(Path::new("LEGACY.PY")), Some(Lang::Python));
        assert_eq!(detect_language(Path::new("Widget.CPP")), Some(Lang::Cpp));
    }

    #[test]
    fn detect_language_unknown_ext_returns_none() {
        assert_eq!(detect_language(Path::new("README.md")), None);
        assert_eq!(detect_language(Path::new("Makefile")), None);
    }

    #[test]
    fn supported_languages_sorted_and_unique() {
        let langs = supported_languages();
        assert_eq!(langs.len(), 9);
        let mut sorted = langs.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(langs, sorted);
        assert!(langs.contains(&"csharp".to_string()));
    }

    #[test]
    fn grammar_returns_some_for_enabled_features() {
        #[cfg(feature = "lang-python")]
        assert!(Lang::Python.grammar().is_some());
        #[cfg(feature = "lang-rust")]
        assert!(Lang::Rust.grammar().is_some());
        #[cfg(feature = "lang-js")]
        assert!(Lang::TypeScript.grammar().is_some());
    }
}
