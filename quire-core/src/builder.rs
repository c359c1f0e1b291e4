use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::app::{App, AppConfig, BlogApp, CommandApp, RenderError};
use crate::config::{Config, GeneratorConfig, RenderConfig, SiteConfig};
use crate::content::{ContentError, ContentFile, load_content};
use crate::generator::{GenerateError, ModuleGenerator, write_modules};
use crate::markdown::CodeBlocks;
use crate::prerender::{PrerenderError, Prerenderer};
use crate::routes::{Route, route_list};
use crate::sitemap::write_sitemap;
use crate::store::FileStore;
use crate::template::TemplateError;
use crate::view::ViewRenderer;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Prerender(#[from] PrerenderError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to load views")]
    Views(#[source] tera::Error),
    #[error("failed to write sitemap into {path}")]
    Sitemap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct SiteBuilder {
    content_dir: PathBuf,
    template_dir: PathBuf,
    generated_dir: PathBuf,
    dist_dir: PathBuf,
    public_dir: PathBuf,
    theme_dir: PathBuf,
    site: SiteConfig,
    generator: GeneratorConfig,
    render: RenderConfig,
}

impl Default for SiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteBuilder {
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            content_dir: config.paths.content.clone(),
            template_dir: config.paths.templates.clone(),
            generated_dir: config.paths.generated.clone(),
            dist_dir: config.paths.dist.clone(),
            public_dir: config.paths.public.clone(),
            theme_dir: config.paths.theme.clone(),
            site: config.site.clone(),
            generator: config.generator.clone(),
            render: config.render.clone(),
        }
    }

    // Paths
    pub fn content_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.content_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn template_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.template_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn generated_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.generated_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn dist_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.dist_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn public_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.public_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn theme_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.theme_dir = path.as_ref().to_path_buf();
        self
    }

    // Settings
    pub fn site_config(mut self, config: SiteConfig) -> Self {
        self.site = config;
        self
    }

    pub fn base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.site.base_url = url.into();
        self
    }

    pub fn generator_config(mut self, config: GeneratorConfig) -> Self {
        self.generator = config;
        self
    }

    pub fn render_config(mut self, config: RenderConfig) -> Self {
        self.render = config;
        self
    }

    /// Load content and work out the routes. Fails only if the content
    /// directory or one of its files cannot be read or parsed.
    pub fn build<S: FileStore>(self, store: &S) -> Result<Site, BuildError> {
        let content = load_content(store, &self.content_dir, &self.generator.extension)?;
        let routes = route_list(content.values().map(|f| f.slug().to_string()));

        Ok(Site {
            content,
            routes,
            template_dir: self.template_dir,
            generated_dir: self.generated_dir,
            dist_dir: self.dist_dir,
            public_dir: self.public_dir,
            theme_dir: self.theme_dir,
            site: self.site,
            generator: self.generator,
            render: self.render,
        })
    }
}

/// Loaded content plus everything needed to emit each kind of output.
pub struct Site {
    content: BTreeMap<String, ContentFile>,
    routes: Vec<Route>,
    template_dir: PathBuf,
    generated_dir: PathBuf,
    dist_dir: PathBuf,
    public_dir: PathBuf,
    theme_dir: PathBuf,
    site: SiteConfig,
    generator: GeneratorConfig,
    render: RenderConfig,
}

impl Site {
    pub fn content(&self) -> &BTreeMap<String, ContentFile> {
        &self.content
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            base_url: self.site.base_url.clone(),
            routes: self.routes.clone(),
        }
    }

    /// Per-post modules plus the aggregate index modules.
    pub fn generate_modules<S: FileStore>(&self, store: &S) -> Result<Vec<PathBuf>, BuildError> {
        let generator = ModuleGenerator::load(store, &self.template_dir, &self.generator)?;
        let modules = generator.render_all(&self.content, &self.generated_dir)?;
        Ok(write_modules(store, &modules)?)
    }

    pub fn write_sitemap<S: FileStore>(&self, store: &S) -> Result<PathBuf, BuildError> {
        write_sitemap(store, &self.public_dir, &self.site.base_url, &self.routes).map_err(
            |source| BuildError::Sitemap {
                path: self.public_dir.clone(),
                source,
            },
        )
    }

    /// The built-in application over this site's content.
    pub fn blog_app<S: FileStore>(&self, store: &S) -> Result<BlogApp, BuildError> {
        let views =
            ViewRenderer::new(store, Some(self.theme_dir.as_path())).map_err(BuildError::Views)?;
        Ok(BlogApp::new(
            self.site.clone(),
            &self.content,
            &self.generator.required,
            CodeBlocks::new(self.render.highlight, &self.render.syntax_theme),
            views,
        ))
    }

    /// The application `render.command` asks for, or the built-in one.
    pub fn app<S: FileStore>(&self, store: &S) -> Result<Box<dyn App>, BuildError> {
        if self.render.command.is_empty() {
            Ok(Box::new(self.blog_app(store)?))
        } else {
            let timeout = Duration::from_secs(self.render.timeout_secs);
            Ok(Box::new(CommandApp::new(&self.render.command, timeout)?))
        }
    }

    pub async fn prerender<S: FileStore, A: App + ?Sized>(
        &self,
        store: &S,
        app: &A,
    ) -> Result<Vec<PathBuf>, BuildError> {
        let shell_path = self.template_dir.join(&self.render.shell);
        let prerenderer = Prerenderer::new(store, &shell_path, &self.dist_dir)?;
        Ok(prerenderer.prerender_all(app, &self.app_config()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_builder_overrides_paths() {
        let store = MemoryStore::new()
            .with_file("blog/posts/one.md", "---\ntitle: One\n---\n")
            .with_file("blog/posts/two.md", "---\ntitle: Two\n---\n");

        let site = SiteBuilder::new()
            .content_dir("blog/posts")
            .base_url("https://rhg.dev")
            .build(&store)
            .unwrap();

        assert_eq!(site.content().len(), 2);
        assert_eq!(site.routes().len(), 5);
        assert_eq!(site.app_config().base_url, "https://rhg.dev");
    }

    #[test]
    fn test_command_render_config_picks_command_app() {
        let store = MemoryStore::new().with_file("content/posts/a.md", "");
        let render = RenderConfig {
            command: vec!["node".into(), "ssr.js".into()],
            ..RenderConfig::default()
        };
        let site = SiteBuilder::new()
            .content_dir("content/posts")
            .render_config(render)
            .build(&store)
            .unwrap();
        assert!(site.app(&store).is_ok());
    }

    #[test]
    fn test_missing_content_dir_fails_build() {
        let store = MemoryStore::new();
        assert!(matches!(
            SiteBuilder::new().build(&store),
            Err(BuildError::Content(ContentError::ReadDir { .. }))
        ));
    }
}
