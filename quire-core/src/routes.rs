use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::content::{ContentError, list_content, slug_of};
use crate::store::FileStore;

/// One page of the site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Route {
    Home,
    Posts,
    Post(String),
    NotFound,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Posts => "/posts".to_string(),
            Route::Post(slug) => format!("/posts/{slug}"),
            Route::NotFound => "/not-found".to_string(),
        }
    }

    /// Inverse of [`Route::path`]. Anything unrecognised is `NotFound`.
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Route::Home,
            "/posts" => Route::Posts,
            _ => match trimmed.strip_prefix("/posts/") {
                Some(slug) if !slug.is_empty() && !slug.contains('/') => {
                    Route::Post(slug.to_string())
                }
                _ => Route::NotFound,
            },
        }
    }

    /// Where this route's pre-rendered page lives under `dist`:
    /// `/` is `dist/index.html`, `/posts/x` is `dist/posts/x/index.html`.
    pub fn output_path(&self, dist: &Path) -> PathBuf {
        let path = self.path();
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            dist.join("index.html")
        } else {
            dist.join(relative).join("index.html")
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl From<Route> for String {
    fn from(route: Route) -> Self {
        route.path()
    }
}

impl From<String> for Route {
    fn from(path: String) -> Self {
        Route::parse(&path)
    }
}

/// Home, the listing, one route per slug in the given order, then not-found.
pub fn route_list<I, S>(slugs: I) -> Vec<Route>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut routes = vec![Route::Home, Route::Posts];
    routes.extend(slugs.into_iter().map(|slug| Route::Post(slug.into())));
    routes.push(Route::NotFound);
    routes
}

/// Route list straight from the content directory listing.
pub fn discover_routes<S: FileStore>(
    store: &S,
    content_dir: &Path,
    extension: &str,
) -> Result<Vec<Route>, ContentError> {
    let filenames = list_content(store, content_dir, extension)?;
    let routes = route_list(filenames.iter().map(|f| slug_of(f).to_string()));
    debug!(target: "routes", "{} routes from {}", routes.len(), content_dir.display());
    Ok(routes)
}
