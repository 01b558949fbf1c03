//! One reusable tree-sitter parser per language, loaded once.
//!
//! A language whose grammar is compiled out or fails to load is logged and
//! left unregistered; files in that language are chunked with line windows
//! for the rest of the process.

use std::collections::HashMap;
use std::sync::Mutex;

use tree_sitter::{Parser, Tree};

use crate::error::{OracleError, Result};
use crate::languages::Lang;

pub struct ParserRegistry {
    parsers: HashMap<Lang, Mutex<Parser>>,
}

impl ParserRegistry {
    /// Attempt to load a parser for every language in the extension table.
    pub fn load() -> Self {
        let mut parsers = HashMap::new();

        for lang in Lang::ALL {
            let Some(grammar) = lang.grammar() else {
                tracing::warn!(language = %lang, "grammar not compiled in, using fallback chunking");
                continue;
            };

            let mut parser = Parser::new();
            match parser.set_language(&grammar) {
                Ok(()) => {
                    parsers.insert(lang, Mutex::new(parser));
                }
                Err(e) => {
                    tracing::warn!(language = %lang, error = %e, "failed to load parser, using fallback chunking");
                }
            }
        }

        tracing::debug!(loaded = parsers.len(), "parser registry ready");
        Self { parsers }
    }

    /// A registry with no parsers; every file goes through fallback chunking.
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    pub fn get_parser(&self, lang: Lang) -> Option<&Mutex<Parser>> {
        self.parsers.get(&lang)
    }

    pub fn has_parser(&self, lang: Lang) -> bool {
        self.parsers.contains_key(&lang)
    }

    /// Parse `source`, or `Ok(None)` when no parser is registered for `lang`.
    pub fn parse(&self, lang: Lang, source: &str) -> Result<Option<Tree>> {
        let Some(parser) = self.get_parser(lang) else {
            return Ok(None);
        };

        let mut parser = parser
            .lock()
            .map_err(|_| OracleError::Parse(format!("{lang} parser lock poisoned")))?;

        parser
            .parse(source, None)
            .map(Some)
            .ok_or_else(|| OracleError::Parse(format!("{lang} parser returned no tree")))
    }

    /// Sorted ids of languages with a working parser.
    pub fn loaded_languages(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.parsers.keys().map(|l| l.id().to_string()).collect();
        ids.sort();
        ids
    }
}
