use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::FileStore;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template `{template}` uses `{{{{{name}}}}}` but nothing is bound to it")]
    Unbound { template: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A text file with `{{name}}` placeholders.
///
/// The source is split into literal and placeholder segments once, and every
/// render walks those segments a single time. Substituted values are never
/// rescanned, so a value containing `{{content}}` stays as written and
/// `{{meta.title}}` can never match part of `{{meta.titleLong}}`.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(name: impl Into<String>, source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            let after_open = &rest[start + 2..];
            let placeholder = after_open
                .find("}}")
                .map(|end| &after_open[..end])
                .filter(|inner| is_placeholder_name(inner));

            match placeholder {
                Some(inner) => {
                    literal.push_str(&rest[..start]);
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(inner.to_string()));
                    rest = &after_open[inner.len() + 2..];
                }
                None => {
                    // Not a placeholder; keep one brace and look again from
                    // the next one so `{{{name}}}` still finds `{{name}}`.
                    literal.push_str(&rest[..start + 1]);
                    rest = &rest[start + 1..];
                }
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            name: name.into(),
            segments,
        }
    }

    pub fn load<S: FileStore>(store: &S, path: &Path) -> Result<Self, TemplateError> {
        let source = store
            .read_to_string(path)
            .map_err(|source| TemplateError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::parse(name, &source))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Placeholder names in order of appearance, repeats included.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, bindings: &Bindings) -> Result<String, TemplateError> {
        let mut out = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = bindings.get(name).ok_or_else(|| TemplateError::Unbound {
                        template: self.name.clone(),
                        name: name.clone(),
                    })?;
                    out.push_str(value);
                }
            }
        }

        Ok(out)
    }
}

fn is_placeholder_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Placeholder name to replacement text.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: BTreeMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bind(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Copy every binding from `other`, replacing ours on conflict.
    pub fn extend(&mut self, other: &Bindings) -> &mut Self {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
        self
    }
}
