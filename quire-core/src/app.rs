//! The application being pre-rendered.
//!
//! Rendering one route is a plain request/response: hand the application a
//! route and the site-wide settings, await a [`PageRenderResult`].

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::SiteConfig;
use crate::content::ContentFile;
use crate::markdown::{CodeBlocks, render_markdown};
use crate::routes::Route;
use crate::view::{ViewContext, ViewRenderer};

/// Number of posts shown on the home page.
const HOME_POST_COUNT: usize = 3;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to render view `{view}`")]
    View {
        view: String,
        #[source]
        source: tera::Error,
    },
    #[error("renderer command is empty")]
    EmptyCommand,
    #[error("failed to run `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {code:?}: {stderr}")]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("`{program}` did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },
    #[error("renderer output is not a page result")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub image: String,
}

/// What the application produced for one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRenderResult {
    pub path: String,
    pub meta: PageMeta,
    /// HTML fragment for the page body.
    pub content: String,
}

/// Site-wide settings every render sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub base_url: String,
    pub routes: Vec<Route>,
}

#[async_trait]
pub trait App: Send + Sync {
    async fn render(&self, route: &Route, config: &AppConfig)
    -> Result<PageRenderResult, RenderError>;
}

/// Listing entry for one post.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PostSummary {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub image: String,
    pub date: Option<String>,
}

/// Renders pages in-process from the loaded content.
pub struct BlogApp {
    site: SiteConfig,
    posts: Vec<PostSummary>,
    files: BTreeMap<String, ContentFile>,
    required: Vec<String>,
    code_blocks: CodeBlocks,
    views: ViewRenderer,
}

impl BlogApp {
    pub fn new(
        site: SiteConfig,
        files: &BTreeMap<String, ContentFile>,
        required: &[String],
        code_blocks: CodeBlocks,
        views: ViewRenderer,
    ) -> Self {
        let mut posts: Vec<PostSummary> = files
            .values()
            .map(|file| PostSummary {
                slug: file.slug().to_string(),
                title: file.field("title", required).unwrap_or_default(),
                description: file.field("description", required).unwrap_or_default(),
                image: file
                    .field("image", required)
                    .unwrap_or_else(|| site.image.clone()),
                date: file.field("date", required),
            })
            .collect();

        // Newest first; undated posts last; slug breaks ties.
        posts.sort_by(|a, b| match (&a.date, &b.date) {
            (Some(x), Some(y)) => y.cmp(x).then_with(|| a.slug.cmp(&b.slug)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.slug.cmp(&b.slug),
        });

        let files = files
            .values()
            .map(|f| (f.slug().to_string(), f.clone()))
            .collect();

        Self {
            site,
            posts,
            files,
            required: required.to_vec(),
            code_blocks,
            views,
        }
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    fn render_view(&self, view: &str, context: &ViewContext) -> Result<String, RenderError> {
        self.views
            .render(view, context)
            .map_err(|source| RenderError::View {
                view: view.to_string(),
                source,
            })
    }

    fn site_meta(&self, title: Option<&str>) -> PageMeta {
        PageMeta {
            title: match title {
                Some(title) => format!("{title} | {}", self.site.title),
                None => self.site.title.clone(),
            },
            description: self.site.description.clone(),
            image: self.site.image.clone(),
        }
    }

    fn render_not_found(&self, path: &str) -> Result<(PageMeta, String), RenderError> {
        let mut context = ViewContext::new();
        context.add_to_context("site", &self.site);
        context.add_to_context("path", path);
        let content = self.render_view("not_found.html", &context)?;
        Ok((self.site_meta(Some("Page not found")), content))
    }
}

#[async_trait]
impl App for BlogApp {
    async fn render(
        &self,
        route: &Route,
        _config: &AppConfig,
    ) -> Result<PageRenderResult, RenderError> {
        let path = route.path();
        let mut context = ViewContext::new();
        context.add_to_context("site", &self.site);

        let (meta, content) = match route {
            Route::Home => {
                let latest = &self.posts[..self.posts.len().min(HOME_POST_COUNT)];
                context.add_to_context("posts", latest);
                (self.site_meta(None), self.render_view("home.html", &context)?)
            }
            Route::Posts => {
                context.add_to_context("posts", &self.posts);
                (self.site_meta(Some("Posts")), self.render_view("posts.html", &context)?)
            }
            Route::Post(slug) => match (self.files.get(slug), self.posts.iter().find(|p| &p.slug == slug)) {
                (Some(file), Some(summary)) => {
                    let body = render_markdown(&file.body, &self.code_blocks);
                    context.add_to_context("post", summary);
                    context.add_to_context("body", &body);
                    let meta = PageMeta {
                        title: summary.title.clone(),
                        description: file
                            .field("description", &self.required)
                            .unwrap_or_else(|| self.site.description.clone()),
                        image: summary.image.clone(),
                    };
                    (meta, self.render_view("post.html", &context)?)
                }
                _ => self.render_not_found(&path)?,
            },
            Route::NotFound => self.render_not_found(&path)?,
        };

        Ok(PageRenderResult {
            path,
            meta,
            content,
        })
    }
}

/// Flags handed to an external renderer, one process per route.
#[derive(Serialize)]
struct Flags<'a> {
    config: &'a AppConfig,
    path: String,
}

/// Runs an external headless renderer per route: flags JSON on stdin, a
/// [`PageRenderResult`] JSON object on stdout.
#[derive(Debug, Clone)]
pub struct CommandApp {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl CommandApp {
    pub fn new(argv: &[String], timeout: Duration) -> Result<Self, RenderError> {
        let (program, args) = argv.split_first().ok_or(RenderError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir: None,
            timeout,
        })
    }

    pub fn working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn spawn_error(&self, source: std::io::Error) -> RenderError {
        RenderError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl App for CommandApp {
    async fn render(
        &self,
        route: &Route,
        config: &AppConfig,
    ) -> Result<PageRenderResult, RenderError> {
        let flags = serde_json::to_vec(&Flags {
            config,
            path: route.path(),
        })
        .map_err(RenderError::Decode)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!(target: "prerender", "{} {:?} for {}", self.program, self.args, route);
        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        // The flags write shares the timeout; a renderer that never reads
        // stdin blocks it once the pipe is full.
        let exchange = async move {
            if let Some(mut stdin) = child.stdin.take() {
                match stdin.write_all(&flags).await {
                    // The renderer may not care about its flags.
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                    Err(e) => return Err(e),
                    Ok(()) => {}
                }
                drop(stdin); // Close stdin to signal EOF
            }
            child.wait_with_output().await
        };

        let output = timeout(self.timeout, exchange)
            .await
            .map_err(|_| RenderError::Timeout {
                program: self.program.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(RenderError::Exit {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(RenderError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::route_list;

    fn files() -> BTreeMap<String, ContentFile> {
        [
            ("old.md", "---\ntitle: Old\ndescription: first\nimage: /old.png\ndate: 2020-01-01\n---\nold"),
            ("new.md", "---\ntitle: New\ndescription: second\nimage: /new.png\ndate: 2021-06-01\n---\n# New\n\n```elm\nx = 1\n```\n"),
            ("undated.md", "---\ntitle: Undated\n---\nu"),
        ]
        .into_iter()
        .map(|(name, source)| (name.to_string(), ContentFile::parse(name, source).unwrap()))
        .collect()
    }

    fn app() -> BlogApp {
        let required: Vec<String> = vec!["title".into(), "description".into()];
        BlogApp::new(
            SiteConfig::default(),
            &files(),
            &required,
            CodeBlocks::default(),
            ViewRenderer::new(&crate::store::MemoryStore::new(), None).unwrap(),
        )
    }

    fn config() -> AppConfig {
        AppConfig {
            base_url: "https://rhg.dev".into(),
            routes: route_list(["new", "old", "undated"]),
        }
    }

    #[test]
    fn test_posts_are_newest_first() {
        let slugs: Vec<_> = app().posts().iter().map(|p| p.slug.clone()).collect();
        assert_eq!(slugs, vec!["new", "old", "undated"]);
    }

    #[tokio::test]
    async fn test_post_route_uses_post_meta() {
        let result = app()
            .render(&Route::Post("new".into()), &config())
            .await
            .unwrap();

        assert_eq!(result.path, "/posts/new");
        assert_eq!(result.meta.title, "New");
        assert_eq!(result.meta.description, "second");
        assert_eq!(result.meta.image, "/new.png");
        assert!(result.content.contains("<h1>New</h1>"));
        assert!(result.content.contains("<hljs-pre class=\"elm\""));
    }

    #[tokio::test]
    async fn test_missing_required_meta_shows_placeholder() {
        let result = app()
            .render(&Route::Post("undated".into()), &config())
            .await
            .unwrap();
        assert_eq!(result.meta.description, "undated.md is missing description");
        // not required, falls back to the site image
        assert_eq!(result.meta.image, SiteConfig::default().image);
    }

    #[tokio::test]
    async fn test_listing_and_home() {
        let app = app();
        let posts = app.render(&Route::Posts, &config()).await.unwrap();
        assert!(posts.meta.title.starts_with("Posts | "));
        assert!(posts.content.contains("Undated"));

        let home = app.render(&Route::Home, &config()).await.unwrap();
        assert_eq!(home.path, "/");
        assert_eq!(home.meta.title, SiteConfig::default().title);
    }

    #[tokio::test]
    async fn test_unknown_post_renders_not_found() {
        let result = app()
            .render(&Route::Post("ghost".into()), &config())
            .await
            .unwrap();
        assert_eq!(result.path, "/posts/ghost");
        assert!(result.meta.title.starts_with("Page not found"));
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(matches!(
            CommandApp::new(&[], Duration::from_secs(1)),
            Err(RenderError::EmptyCommand)
        ));
    }

    #[cfg(unix)]
    fn sh(script: &str, secs: u64) -> CommandApp {
        let argv = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        CommandApp::new(&argv, Duration::from_secs(secs)).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_app_receives_flags_and_returns_result() {
        let app = sh(
            r#"flags=$(cat); case "$flags" in *'"path":"/posts"'*'"baseUrl":"https://rhg.dev"'*|*'"baseUrl":"https://rhg.dev"'*'"path":"/posts"'*) printf '{"path":"/posts","meta":{"title":"Posts","description":"D","image":"I"},"content":"<p>ok</p>"}' ;; *) echo "bad flags: $flags" >&2; exit 3 ;; esac"#,
            10,
        );

        let result = app.render(&Route::Posts, &config()).await.unwrap();
        assert_eq!(result.path, "/posts");
        assert_eq!(result.meta.title, "Posts");
        assert_eq!(result.content, "<p>ok</p>");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_app_failure_carries_stderr() {
        let app = sh("cat >/dev/null; echo boom >&2; exit 2", 10);
        match app.render(&Route::Home, &config()).await {
            Err(RenderError::Exit { code, stderr, .. }) => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_app_bad_json() {
        let app = sh("cat >/dev/null; echo not json", 10);
        assert!(matches!(
            app.render(&Route::Home, &config()).await,
            Err(RenderError::Decode(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_app_times_out_when_flags_are_never_read() {
        let slugs: Vec<String> = (0..20_000).map(|i| format!("post-number-{i}")).collect();
        let config = AppConfig {
            base_url: "https://rhg.dev".into(),
            routes: route_list(slugs),
        };
        let argv = vec!["sh".to_string(), "-c".to_string(), "sleep 5".to_string()];
        let app = CommandApp::new(&argv, Duration::from_millis(200)).unwrap();

        let started = std::time::Instant::now();
        assert!(matches!(
            app.render(&Route::Home, &config).await,
            Err(RenderError::Timeout { .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_app_times_out() {
        let argv = vec!["sh".to_string(), "-c".to_string(), "sleep 5".to_string()];
        let app = CommandApp::new(&argv, Duration::from_millis(100)).unwrap();
        assert!(matches!(
            app.render(&Route::Home, &config()).await,
            Err(RenderError::Timeout { .. })
        ));
    }
}
