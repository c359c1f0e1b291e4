use std::io::ErrorKind;
use std::path::Path;

use log::debug;
use serde::Serialize;
use tera::{Context, Tera};

use crate::store::FileStore;

const DEFAULT_VIEWS: [(&str, &str); 5] = [
    ("home.html", include_str!("../views/home.html")),
    ("posts.html", include_str!("../views/posts.html")),
    ("post_list.html", include_str!("../views/post_list.html")),
    ("post.html", include_str!("../views/post.html")),
    ("not_found.html", include_str!("../views/not_found.html")),
];

/// Tera views for the built-in application's page fragments.
///
/// Templates in the theme directory win over the built-in ones with the same
/// name; anything the theme does not provide falls back to the defaults.
pub struct ViewRenderer {
    tera: Tera,
}

impl ViewRenderer {
    /// Built-in views plus the `.html` files directly under `theme_dir`,
    /// read through `store`. A missing theme directory means no overrides.
    pub fn new<S: FileStore>(store: &S, theme_dir: Option<&Path>) -> Result<Self, tera::Error> {
        let mut templates: Vec<(String, String)> = DEFAULT_VIEWS
            .iter()
            .map(|(name, source)| (name.to_string(), source.to_string()))
            .collect();

        if let Some(dir) = theme_dir {
            match store.list_files(dir) {
                Ok(names) => {
                    debug!(target: "prerender", "loading views from {}", dir.display());
                    for name in names.into_iter().filter(|n| n.ends_with(".html")) {
                        let path = dir.join(&name);
                        let source = store.read_to_string(&path).map_err(|e| {
                            tera::Error::chain(format!("failed to read view {}", path.display()), e)
                        })?;
                        // later entries replace built-ins of the same name
                        templates.push((name, source));
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(tera::Error::chain(
                        format!("failed to list views in {}", dir.display()),
                        e,
                    ));
                }
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)?;

        Ok(Self { tera })
    }

    pub fn render(&self, view: &str, context: &ViewContext) -> Result<String, tera::Error> {
        self.tera.render(view, &context.context)
    }
}

/// Values handed to one view render.
#[derive(Default)]
pub struct ViewContext {
    context: Context,
}

impl ViewContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_to_context<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        self.context.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DiskStore, MemoryStore};

    #[test]
    fn test_defaults_render() {
        let views = ViewRenderer::new(&MemoryStore::new(), None).unwrap();
        let mut context = ViewContext::new();
        context.add_to_context("path", "nope");
        let html = views.render("not_found.html", &context).unwrap();
        assert!(html.contains("<code>nope</code>"));
    }

    #[test]
    fn test_theme_overrides_single_view() {
        let store = MemoryStore::new()
            .with_file("theme/not_found.html", "custom {{ path }}")
            .with_file("theme/notes.txt", "ignored");

        let views = ViewRenderer::new(&store, Some(Path::new("theme"))).unwrap();
        let mut context = ViewContext::new();
        context.add_to_context("path", "x");
        context.add_to_context("posts", &Vec::<String>::new());
        context.add_to_context("site", &serde_json::json!({"title": "T", "description": "D"}));

        assert_eq!(views.render("not_found.html", &context).unwrap(), "custom x");
        assert!(views.render("home.html", &context).unwrap().contains("<h1>T</h1>"));
    }

    #[test]
    fn test_theme_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("posts.html"), "all posts").unwrap();

        let views = ViewRenderer::new(&DiskStore, Some(dir.path())).unwrap();
        assert_eq!(views.render("posts.html", &ViewContext::new()).unwrap(), "all posts");
    }

    #[test]
    fn test_theme_is_read_from_the_given_store_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("not_found.html"), "from disk").unwrap();

        let views = ViewRenderer::new(&MemoryStore::new(), Some(dir.path())).unwrap();
        let mut context = ViewContext::new();
        context.add_to_context("path", "x");
        assert!(views.render("not_found.html", &context).unwrap().contains("<code>x</code>"));
    }

    #[test]
    fn test_missing_theme_dir_uses_defaults() {
        let views =
            ViewRenderer::new(&DiskStore, Some(Path::new("/does/not/exist"))).unwrap();
        let mut context = ViewContext::new();
        context.add_to_context("posts", &Vec::<String>::new());
        assert!(views.render("posts.html", &context).is_ok());
    }
}
