use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use walkdir::WalkDir;

/// File access used by every generation step.
///
/// Generation is a pure function of what this store returns, so tests can run
/// the whole pipeline against a [`MemoryStore`].
pub trait FileStore {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// File names (not paths) directly under `dir`, sorted.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Write `contents` to `path`, creating parent directories and
    /// overwriting whatever was there.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

impl<S: FileStore + ?Sized> FileStore for &S {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        (**self).read_to_string(path)
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        (**self).list_files(dir)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        (**self).write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
}

/// The real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskStore;

impl FileStore for DiskStore {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();

        Ok(names)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// In-memory store keyed by path. Directories exist implicitly whenever a
/// file lives under them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<PathBuf, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for seeding fixtures.
    pub fn with_file<P: AsRef<Path>>(self, path: P, contents: &str) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert<P: AsRef<Path>>(&self, path: P, contents: &str) {
        self.lock()
            .insert(normalize(path.as_ref()), contents.to_string());
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<String> {
        self.lock().get(&normalize(path.as_ref())).cloned()
    }

    /// Every stored path, in order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, String>> {
        // A poisoned map is still a consistent map; nothing is half-written.
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `./a/b` and `a/b` name the same entry.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

impl FileStore for MemoryStore {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        let dir = normalize(dir);
        let dir = dir.as_path();
        let files = self.lock();
        let mut found_dir = false;
        let mut names = Vec::new();

        for path in files.keys() {
            if !path.starts_with(dir) || path == dir {
                continue;
            }
            found_dir = true;
            if path.parent() == Some(dir) {
                if let Some(name) = path.file_name() {
                    names.push(name.to_string_lossy().to_string());
                }
            }
        }

        if !found_dir {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", dir.display()),
            ));
        }

        // BTreeMap iteration is already ordered by full path, which orders
        // siblings by name as well.
        Ok(names)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.insert(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.lock().keys().any(|p| p.starts_with(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_lists_direct_children_only() {
        let store = MemoryStore::new()
            .with_file("content/posts/b.md", "b")
            .with_file("content/posts/a.md", "a")
            .with_file("content/posts/drafts/c.md", "c")
            .with_file("content/other.md", "x");

        let names = store.list_files(Path::new("content/posts")).unwrap();
        assert_eq!(names, vec!["a.md", "b.md"]);
    }

    #[test]
    fn test_memory_store_missing_dir_is_not_found() {
        let store = MemoryStore::new().with_file("a/b.md", "");
        let err = store.list_files(Path::new("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_memory_store_ignores_leading_dot() {
        let store = MemoryStore::new().with_file("./content/posts/a.md", "a");
        assert_eq!(store.get("content/posts/a.md").as_deref(), Some("a"));
        assert_eq!(
            store.list_files(Path::new("./content/posts")).unwrap(),
            vec!["a.md"]
        );
    }

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryStore::new();
        store.write(Path::new("dist/index.html"), "one").unwrap();
        store.write(Path::new("dist/index.html"), "two").unwrap();
        assert_eq!(store.get("dist/index.html").as_deref(), Some("two"));
        assert!(store.exists(Path::new("dist")));
    }

    #[test]
    fn test_disk_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore;
        let nested = dir.path().join("posts/hello/index.html");

        store.write(&nested, "<p>hi</p>").unwrap();
        store.write(&dir.path().join("posts/z.md"), "z").unwrap();
        store.write(&dir.path().join("posts/a.md"), "a").unwrap();

        assert_eq!(store.read_to_string(&nested).unwrap(), "<p>hi</p>");
        assert_eq!(
            store.list_files(&dir.path().join("posts")).unwrap(),
            vec!["a.md", "z.md"]
        );
    }

    #[test]
    fn test_disk_store_missing_dir_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DiskStore.list_files(&dir.path().join("nope")).is_err());
    }
}
