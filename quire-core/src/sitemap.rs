//! `sitemap.xml` for the pre-rendered routes.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url><loc>https://example.com/</loc></url>
//!   <url><loc>https://example.com/posts</loc></url>
//! </urlset>
//! ```

use std::path::{Path, PathBuf};

use log::info;

use crate::routes::Route;
use crate::store::FileStore;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

pub const SITEMAP_FILENAME: &str = "sitemap.xml";

/// One `<url><loc>` per route, in route order.
pub fn sitemap(base_url: &str, routes: &[Route]) -> String {
    let entries: Vec<String> = routes
        .iter()
        .map(|route| {
            format!(
                "<url><loc>{}</loc></url>",
                escape_xml(&format!("{base_url}{}", route.path()))
            )
        })
        .collect();

    let mut xml = String::with_capacity(128 + entries.len() * 64);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#));
    xml.push_str("\n  ");
    xml.push_str(&entries.join("\n  "));
    xml.push_str("\n</urlset>");
    xml
}

/// Write the sitemap into `public_dir` and return its path.
pub fn write_sitemap<S: FileStore>(
    store: &S,
    public_dir: &Path,
    base_url: &str,
    routes: &[Route],
) -> std::io::Result<PathBuf> {
    let path = public_dir.join(SITEMAP_FILENAME);
    store.write(&path, &sitemap(base_url, routes))?;

    info!(target: "sitemap", "{} urls -> {}", routes.len(), path.display());
    Ok(path)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::route_list;
    use crate::store::MemoryStore;

    #[test]
    fn test_sitemap_layout() {
        let xml = sitemap("https://rhg.dev", &route_list(["hello-world"]));
        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://rhg.dev/</loc></url>
  <url><loc>https://rhg.dev/posts</loc></url>
  <url><loc>https://rhg.dev/posts/hello-world</loc></url>
  <url><loc>https://rhg.dev/not-found</loc></url>
</urlset>"#;
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_one_entry_per_route_in_order() {
        let routes = route_list(["b", "a", "c"]);
        let xml = sitemap("https://x.dev", &routes);
        let locs: Vec<&str> = xml
            .match_indices("<loc>")
            .map(|(i, _)| {
                let rest = &xml[i + 5..];
                &rest[..rest.find("</loc>").unwrap()]
            })
            .collect();
        assert_eq!(locs.len(), routes.len());
        assert_eq!(locs[2], "https://x.dev/posts/b");
        assert_eq!(locs[4], "https://x.dev/posts/c");
    }

    #[test]
    fn test_loc_is_escaped() {
        let xml = sitemap("https://x.dev", &route_list(["fish&chips"]));
        assert!(xml.contains("<loc>https://x.dev/posts/fish&amp;chips</loc>"));
    }

    #[test]
    fn test_write_sitemap_to_public() {
        let store = MemoryStore::new();
        let path = write_sitemap(&store, Path::new("public"), "https://x.dev", &route_list(["a"]))
            .unwrap();
        assert_eq!(path, PathBuf::from("public/sitemap.xml"));
        assert!(store.get("public/sitemap.xml").unwrap().contains("/posts/a"));
    }
}
