use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_yaml::Value;
use thiserror::Error;

use crate::store::FileStore;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to list content directory {path}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read content file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed front-matter in {filename}")]
    FrontMatter {
        filename: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Front-matter of one post. Absent keys stay `None`; [`ContentFile::field`]
/// decides what a missing key turns into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub date: Option<String>,
    /// Any other scalar keys, stringified.
    pub extra: BTreeMap<String, String>,
}

impl Meta {
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "title" => self.title.as_deref(),
            "description" => self.description.as_deref(),
            "image" => self.image.as_deref(),
            "date" => self.date.as_deref(),
            other => self.extra.get(other).map(String::as_str),
        }
    }

    fn from_yaml(filename: &str, yaml: &str) -> Result<Self, ContentError> {
        let value: Value =
            serde_yaml::from_str(yaml).map_err(|source| ContentError::FrontMatter {
                filename: filename.to_string(),
                source,
            })?;

        let mut meta = Meta::default();
        let Value::Mapping(mapping) = value else {
            // An empty block parses as null; anything else non-mapping is
            // treated the same way, as no metadata.
            return Ok(meta);
        };

        for (key, value) in mapping {
            let Some(key) = scalar_to_string(&key) else {
                continue;
            };
            let Some(value) = scalar_to_string(&value).filter(|v| !v.is_empty()) else {
                debug!(target: "content", "{filename}: ignoring empty or non-scalar key `{key}`");
                continue;
            };

            match key.as_str() {
                "title" => meta.title = Some(value),
                "description" => meta.description = Some(value),
                "image" => meta.image = Some(value),
                "date" => meta.date = Some(value),
                _ => {
                    meta.extra.insert(key, value);
                }
            }
        }

        Ok(meta)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// One markdown file, split into metadata and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFile {
    pub filename: String,
    pub meta: Meta,
    pub body: String,
}

impl ContentFile {
    pub fn parse(filename: &str, source: &str) -> Result<Self, ContentError> {
        let (front_matter, body) = split_front_matter(source);
        let meta = match front_matter {
            Some(yaml) => Meta::from_yaml(filename, yaml)?,
            None => Meta::default(),
        };

        Ok(Self {
            filename: filename.to_string(),
            meta,
            body: body.to_string(),
        })
    }

    /// Value of a front-matter key. Keys listed in `required` that are
    /// missing come back as `"<filename> is missing <key>"` so a broken post
    /// still builds and is easy to spot; other missing keys are `None`.
    pub fn field(&self, key: &str, required: &[String]) -> Option<String> {
        match self.meta.get(key) {
            Some(value) => Some(value.to_string()),
            None if required.iter().any(|r| r == key) => Some(missing_placeholder(&self.filename, key)),
            None => None,
        }
    }

    /// Filename without its extension.
    pub fn slug(&self) -> &str {
        slug_of(&self.filename)
    }
}

pub fn missing_placeholder(filename: &str, field: &str) -> String {
    format!("{filename} is missing {field}")
}

/// Strip the last extension: `hello-world.md` becomes `hello-world`.
pub fn slug_of(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    }
}

/// Split a leading `---` fenced YAML block from the rest of the document.
///
/// The block opens with a `---` line (after an optional BOM) and closes with
/// `---` or `...`. Blank lines right after the closing fence are not part of
/// the body. Without both fences the whole input is body.
pub fn split_front_matter(source: &str) -> (Option<&str>, &str) {
    let text = source.strip_prefix('\u{feff}').unwrap_or(source);

    let Some((first, after_open)) = split_line(text) else {
        return (None, source);
    };
    if first.trim_end() != "---" {
        return (None, source);
    }

    let mut offset = 0;
    let mut rest = after_open;
    while let Some((line, next)) = split_line(rest) {
        let fence = line.trim_end();
        if fence == "---" || fence == "..." {
            let yaml = &after_open[..offset];
            return (Some(yaml), skip_blank_lines(next));
        }
        offset += rest.len() - next.len();
        rest = next;
    }

    (None, source)
}

/// First line (without its terminator) and everything after it.
fn split_line(text: &str) -> Option<(&str, &str)> {
    if text.is_empty() {
        return None;
    }
    match text.find('\n') {
        Some(idx) => Some((text[..idx].trim_end_matches('\r'), &text[idx + 1..])),
        None => Some((text, "")),
    }
}

fn skip_blank_lines(mut text: &str) -> &str {
    while let Some((line, next)) = split_line(text) {
        if !line.trim().is_empty() {
            break;
        }
        text = next;
    }
    text
}

/// Load every content file under `dir` whose extension is `extension`.
///
/// Keyed by filename, so iteration order is filename order.
pub fn load_content<S: FileStore>(
    store: &S,
    dir: &Path,
    extension: &str,
) -> Result<BTreeMap<String, ContentFile>, ContentError> {
    let filenames = list_content(store, dir, extension)?;
    let mut files = BTreeMap::new();

    for filename in filenames {
        let path = dir.join(&filename);
        let source = store
            .read_to_string(&path)
            .map_err(|source| ContentError::Read {
                path: path.clone(),
                source,
            })?;

        let file = ContentFile::parse(&filename, &source)?;
        debug!(target: "content", "loaded {filename}");
        files.insert(filename, file);
    }

    info!(target: "content", "loaded {} posts from {}", files.len(), dir.display());
    Ok(files)
}

/// Content filenames under `dir`, sorted, filtered by extension.
pub fn list_content<S: FileStore>(
    store: &S,
    dir: &Path,
    extension: &str,
) -> Result<Vec<String>, ContentError> {
    let names = store.list_files(dir).map_err(|source| ContentError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    Ok(names
        .into_iter()
        .filter(|name| {
            Path::new(name)
                .extension()
                .map(|ext| ext == extension)
                .unwrap_or(false)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const HELLO: &str = "---\ntitle: Hello\ndescription: A post\nimage: /img.png\ndate: 2021-01-01\n---\n\n# Hello\n\nBody text.\n";

    fn required() -> Vec<String> {
        ["title", "description", "image", "date"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_front_matter_and_body() {
        let file = ContentFile::parse("hello-world.md", HELLO).unwrap();
        assert_eq!(file.meta.title.as_deref(), Some("Hello"));
        assert_eq!(file.meta.description.as_deref(), Some("A post"));
        assert_eq!(file.meta.image.as_deref(), Some("/img.png"));
        assert_eq!(file.meta.date.as_deref(), Some("2021-01-01"));
        assert_eq!(file.body, "# Hello\n\nBody text.\n");
        assert_eq!(file.slug(), "hello-world");
    }

    #[test]
    fn test_missing_required_field_gets_placeholder() {
        let file = ContentFile::parse("hello-world.md", "---\ntitle: Hello\n---\nhi").unwrap();
        assert_eq!(
            file.field("description", &required()).as_deref(),
            Some("hello-world.md is missing description")
        );
        assert_eq!(file.field("title", &required()).as_deref(), Some("Hello"));
        assert_eq!(file.field("author", &required()), None);
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let file = ContentFile::parse("a.md", "---\ntitle: ''\nimage:\n---\n").unwrap();
        assert_eq!(file.meta.title, None);
        assert_eq!(file.meta.image, None);
        assert_eq!(
            file.field("title", &required()).as_deref(),
            Some("a.md is missing title")
        );
    }

    #[test]
    fn test_extra_scalars_are_kept() {
        let file =
            ContentFile::parse("a.md", "---\ntitle: T\ndraft: true\nminutes: 4\ntags: [a, b]\n---\n")
                .unwrap();
        assert_eq!(file.meta.get("draft"), Some("true"));
        assert_eq!(file.meta.get("minutes"), Some("4"));
        assert_eq!(file.meta.get("tags"), None);
    }

    #[test]
    fn test_no_front_matter_means_whole_body() {
        let source = "# Just markdown\n";
        assert_eq!(split_front_matter(source), (None, source));

        let unclosed = "---\ntitle: x\nno closing fence\n";
        assert_eq!(split_front_matter(unclosed), (None, unclosed));
    }

    #[test]
    fn test_split_handles_crlf_bom_and_dots() {
        let (yaml, body) = split_front_matter("\u{feff}---\r\ntitle: x\r\n...\r\nbody");
        assert_eq!(yaml, Some("title: x\r\n"));
        assert_eq!(body, "body");
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let err = ContentFile::parse("bad.md", "---\ntitle: [unclosed\n---\n").unwrap_err();
        assert!(matches!(err, ContentError::FrontMatter { ref filename, .. } if filename == "bad.md"));
    }

    #[test]
    fn test_load_content_filters_and_sorts() {
        let store = MemoryStore::new()
            .with_file("content/posts/zebra.md", "---\ntitle: Z\n---\nz")
            .with_file("content/posts/apple.md", "---\ntitle: A\n---\na")
            .with_file("content/posts/notes.txt", "ignored");

        let files = load_content(&store, Path::new("content/posts"), "md").unwrap();
        let names: Vec<_> = files.keys().cloned().collect();
        assert_eq!(names, vec!["apple.md", "zebra.md"]);
    }

    #[test]
    fn test_load_content_missing_dir_is_fatal() {
        let store = MemoryStore::new();
        let err = load_content(&store, Path::new("content/posts"), "md").unwrap_err();
        assert!(matches!(err, ContentError::ReadDir { .. }));
    }
}
