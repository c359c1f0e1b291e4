pub mod app;
pub mod builder;
pub mod config;
pub mod content;
pub mod generator;
pub mod markdown;
pub mod prerender;
pub mod routes;
pub mod sitemap;
pub mod store;
pub mod template;
pub mod view;

// Re-export main types
pub use app::{App, AppConfig, BlogApp, CommandApp, PageMeta, PageRenderResult, RenderError};
pub use builder::{BuildError, Site, SiteBuilder};
pub use content::{ContentFile, Meta};
pub use generator::{GeneratedModule, ModuleGenerator, generate, module_name};
pub use prerender::Prerenderer;
pub use routes::{Route, route_list};
pub use sitemap::sitemap;
pub use store::{DiskStore, FileStore, MemoryStore};
pub use template::{Bindings, Template, TemplateError};
