use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::app::{App, AppConfig, PageRenderResult, RenderError};
use crate::routes::Route;
use crate::store::FileStore;
use crate::template::{Bindings, Template, TemplateError};

#[derive(Debug, Error)]
pub enum PrerenderError {
    #[error("failed to render {route}")]
    Render {
        route: String,
        #[source]
        source: RenderError,
    },
    #[error("failed to fill the shell template for {route}")]
    Shell {
        route: String,
        #[source]
        source: TemplateError,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Wraps rendered pages in the HTML shell and writes one file per route.
pub struct Prerenderer<'a, S: FileStore> {
    store: &'a S,
    shell: Template,
    dist: PathBuf,
}

impl<'a, S: FileStore> Prerenderer<'a, S> {
    pub fn new(store: &'a S, shell_path: &Path, dist: &Path) -> Result<Self, TemplateError> {
        Ok(Self {
            store,
            shell: Template::load(store, shell_path)?,
            dist: dist.to_path_buf(),
        })
    }

    pub fn with_shell(store: &'a S, shell: Template, dist: &Path) -> Self {
        Self {
            store,
            shell,
            dist: dist.to_path_buf(),
        }
    }

    /// The shell with this page's values in place.
    pub fn page_html(
        &self,
        config: &AppConfig,
        page: &PageRenderResult,
    ) -> Result<String, TemplateError> {
        let attr = |s: &str| html_escape::encode_quoted_attribute(s).to_string();
        let bindings = Bindings::new()
            .with("config.baseUrl", config.base_url.as_str())
            .with("meta.title", attr(&page.meta.title))
            .with("meta.description", attr(&page.meta.description))
            .with("meta.image", attr(&page.meta.image))
            .with("path", page.path.as_str())
            .with("content", page.content.as_str());

        self.shell.render(&bindings)
    }

    /// Render, fill and write a single route.
    pub async fn prerender<A: App + ?Sized>(
        &self,
        app: &A,
        config: &AppConfig,
        route: &Route,
    ) -> Result<PathBuf, PrerenderError> {
        let page = app
            .render(route, config)
            .await
            .map_err(|source| PrerenderError::Render {
                route: route.path(),
                source,
            })?;

        let html = self
            .page_html(config, &page)
            .map_err(|source| PrerenderError::Shell {
                route: route.path(),
                source,
            })?;

        let path = route.output_path(&self.dist);
        self.store
            .write(&path, &html)
            .map_err(|source| PrerenderError::Write {
                path: path.clone(),
                source,
            })?;

        debug!(target: "prerender", "{} -> {}", route, path.display());
        Ok(path)
    }

    /// Every route in `config.routes`, one after another. The first failure
    /// stops the run; files already written stay.
    pub async fn prerender_all<A: App + ?Sized>(
        &self,
        app: &A,
        config: &AppConfig,
    ) -> Result<Vec<PathBuf>, PrerenderError> {
        let mut written = Vec::with_capacity(config.routes.len());
        for route in &config.routes {
            written.push(self.prerender(app, config, route).await?);
        }

        info!(target: "prerender", "{} pages in {}", written.len(), self.dist.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::PageMeta;
    use crate::routes::route_list;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    const SHELL: &str = r#"<html><head><title>{{meta.title}}</title><meta name="description" content="{{meta.description}}"><meta property="og:image" content="{{config.baseUrl}}{{meta.image}}"><link rel="canonical" href="{{config.baseUrl}}{{path}}"></head><body>{{content}}</body></html>"#;

    /// Echoes the route back; fails on `/posts/broken`.
    struct EchoApp;

    #[async_trait]
    impl App for EchoApp {
        async fn render(
            &self,
            route: &Route,
            _config: &AppConfig,
        ) -> Result<PageRenderResult, RenderError> {
            if route == &Route::Post("broken".into()) {
                return Err(RenderError::EmptyCommand);
            }
            Ok(PageRenderResult {
                path: route.path(),
                meta: PageMeta {
                    title: format!("Title \"{}\"", route),
                    description: "D".into(),
                    image: "/i.png".into(),
                },
                content: format!("<main>{route}</main>"),
            })
        }
    }

    fn config(slugs: &[&str]) -> AppConfig {
        AppConfig {
            base_url: "https://rhg.dev".into(),
            routes: route_list(slugs.iter().copied()),
        }
    }

    #[tokio::test]
    async fn test_home_lands_in_dist_index() {
        let store = MemoryStore::new().with_file("ssr/templates/index.html", SHELL);
        let prerenderer =
            Prerenderer::new(&store, Path::new("ssr/templates/index.html"), Path::new("dist"))
                .unwrap();

        let path = prerenderer
            .prerender(&EchoApp, &config(&[]), &Route::Home)
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("dist/index.html"));

        let html = store.get("dist/index.html").unwrap();
        assert!(html.contains(r#"href="https://rhg.dev/""#));
        assert!(html.contains("<title>Title &quot;/&quot;</title>"));
        assert!(html.contains("<body><main>/</main></body>"));
        assert!(!html.contains("{{"));
    }

    #[tokio::test]
    async fn test_every_route_written() {
        let store = MemoryStore::new();
        let prerenderer =
            Prerenderer::with_shell(&store, Template::parse("shell", SHELL), Path::new("dist"));

        let written = prerenderer
            .prerender_all(&EchoApp, &config(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(written.len(), 5);
        for expected in [
            "dist/index.html",
            "dist/posts/index.html",
            "dist/posts/a/index.html",
            "dist/posts/b/index.html",
            "dist/not-found/index.html",
        ] {
            assert!(store.get(expected).is_some(), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn test_failure_names_route_and_keeps_earlier_pages() {
        let store = MemoryStore::new();
        let prerenderer =
            Prerenderer::with_shell(&store, Template::parse("shell", SHELL), Path::new("dist"));

        let err = prerenderer
            .prerender_all(&EchoApp, &config(&["a", "broken", "c"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PrerenderError::Render { ref route, .. } if route == "/posts/broken"));
        assert!(store.get("dist/posts/a/index.html").is_some());
        assert!(store.get("dist/posts/c/index.html").is_none());
    }

    #[tokio::test]
    async fn test_unknown_shell_token_fails() {
        let store = MemoryStore::new();
        let prerenderer = Prerenderer::with_shell(
            &store,
            Template::parse("shell", "{{meta.keywords}}"),
            Path::new("dist"),
        );
        let err = prerenderer
            .prerender(&EchoApp, &config(&[]), &Route::Home)
            .await
            .unwrap_err();
        assert!(matches!(err, PrerenderError::Shell { .. }));
    }

    #[test]
    fn test_missing_shell_is_fatal() {
        let store = MemoryStore::new();
        assert!(Prerenderer::new(&store, Path::new("nope/index.html"), Path::new("dist")).is_err());
    }
}
