use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parsing(#[from] toml::de::Error),
}

/// Everything `quire.toml` can say. Every section is optional.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub paths: PathsConfig,
    pub generator: GeneratorConfig,
    pub render: RenderConfig,
}

impl Config {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&data)?;

        Ok(config)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub title: String,
    pub description: String,
    pub image: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            title: "Blog".to_string(),
            description: "Notes, posts and the occasional rant".to_string(),
            image: "/images/share.png".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub content: PathBuf,
    pub templates: PathBuf,
    pub generated: PathBuf,
    pub dist: PathBuf,
    pub public: PathBuf,
    pub theme: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content: PathBuf::from("./content/posts"),
            templates: PathBuf::from("./ssr/templates"),
            generated: PathBuf::from("./src"),
            dist: PathBuf::from("./dist"),
            public: PathBuf::from("./public"),
            theme: PathBuf::from("./theme"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Prepended to every module name as `Prefix.Name`. Empty means none.
    pub module_prefix: String,
    /// Filename segments are split on this before capitalizing.
    pub delimiter: String,
    /// Extension of content files, without the dot.
    pub extension: String,
    /// Front-matter keys that get a visible placeholder when missing.
    pub required: Vec<String>,
    pub post_template: String,
    /// Per-post modules land here, relative to the generated root.
    pub post_output_dir: PathBuf,
    #[serde(rename = "aggregate")]
    pub aggregates: Vec<AggregateConfig>,
    #[serde(rename = "fragment")]
    pub fragments: Vec<FragmentConfig>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            module_prefix: "Content".to_string(),
            delimiter: "-".to_string(),
            extension: "md".to_string(),
            required: ["title", "description", "image", "date"]
                .into_iter()
                .map(String::from)
                .collect(),
            post_template: "Post.elm".to_string(),
            post_output_dir: PathBuf::from("Content"),
            aggregates: vec![
                AggregateConfig {
                    template: "Content.elm".to_string(),
                    output: PathBuf::from("Content.elm"),
                    optional: false,
                },
                AggregateConfig {
                    template: "Posts.elm".to_string(),
                    output: PathBuf::from("Posts.elm"),
                    optional: true,
                },
            ],
            fragments: default_fragments(),
        }
    }
}

/// An index module rendered once over all content files.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AggregateConfig {
    /// Template file name, relative to the templates directory.
    pub template: String,
    /// Output path, relative to the generated root.
    pub output: PathBuf,
    /// Skip silently when the template file does not exist.
    #[serde(default)]
    pub optional: bool,
}

/// A per-file snippet repeated once per content file and joined.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FragmentConfig {
    /// Placeholder name this fragment list binds to in aggregate templates.
    pub token: String,
    pub pattern: String,
    pub separator: String,
}

fn default_fragments() -> Vec<FragmentConfig> {
    let fragment = |token: &str, pattern: &str, separator: &str| FragmentConfig {
        token: token.to_string(),
        pattern: pattern.to_string(),
        separator: separator.to_string(),
    };

    vec![
        fragment("imports", "import {{moduleName}}", "\n"),
        fragment(
            "branches",
            "\"{{slug}}\" ->\n            Just {{moduleName}}.view",
            "\n\n        ",
        ),
        fragment(
            "metadata",
            "{ slug = \"{{slug}}\", title = \"{{meta.title}}\", description = \"{{meta.description}}\", image = \"{{meta.image}}\", date = \"{{meta.date}}\" }",
            "\n    , ",
        ),
    ]
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HighlightMode {
    /// Emit `hljs-pre` elements and let the browser highlight.
    #[default]
    Client,
    /// Highlight at build time with syntect.
    Server,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct RenderConfig {
    /// HTML shell template, relative to the templates directory.
    pub shell: String,
    pub highlight: HighlightMode,
    pub syntax_theme: String,
    /// When non-empty, pages are rendered by this external program instead
    /// of the built-in application.
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            shell: "index.html".to_string(),
            highlight: HighlightMode::Client,
            syntax_theme: "base16-ocean.dark".to_string(),
            command: Vec::new(),
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = Config::default();
        assert_eq!(config.paths.content, PathBuf::from("./content/posts"));
        assert_eq!(config.paths.dist, PathBuf::from("./dist"));
        assert_eq!(config.generator.module_prefix, "Content");
        assert_eq!(config.generator.required.len(), 4);
        assert_eq!(config.render.shell, "index.html");
        assert_eq!(config.render.highlight, HighlightMode::Client);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [site]
            base_url = "https://rhg.dev"

            [render]
            highlight = "server"
            "#,
        )
        .unwrap();

        assert_eq!(config.site.base_url, "https://rhg.dev");
        assert_eq!(config.site.title, "Blog");
        assert_eq!(config.render.highlight, HighlightMode::Server);
        assert_eq!(config.render.timeout_secs, 30);
        assert_eq!(config.generator.aggregates.len(), 2);
    }

    #[test]
    fn test_aggregate_and_fragment_tables() {
        let config: Config = toml::from_str(
            r#"
            [generator]
            module_prefix = ""

            [[generator.aggregate]]
            template = "Index.elm"
            output = "Index.elm"

            [[generator.fragment]]
            token = "imports"
            pattern = "import {{moduleName}}"
            separator = "\n"
            "#,
        )
        .unwrap();

        assert_eq!(config.generator.module_prefix, "");
        assert_eq!(config.generator.aggregates.len(), 1);
        assert!(!config.generator.aggregates[0].optional);
        assert_eq!(config.generator.fragments.len(), 1);
        assert_eq!(config.generator.delimiter, "-");
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err = Config::read("/definitely/not/here/quire.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
