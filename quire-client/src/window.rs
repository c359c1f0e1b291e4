/// The parts of `window.location` the bootstrap reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Scheme including the trailing colon, e.g. `https:`.
    pub protocol: String,
    /// Host name plus port, if any.
    pub host: String,
    pub pathname: String,
}

impl Location {
    /// Split an absolute URL. Query and fragment are dropped.
    pub fn parse(url: &str) -> Option<Self> {
        let (scheme, rest) = url.split_once("://")?;
        if scheme.is_empty() {
            return None;
        }

        let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (host, tail) = rest.split_at(host_end);
        let path_end = tail.find(['?', '#']).unwrap_or(tail.len());
        let pathname = match &tail[..path_end] {
            "" => "/",
            path => path,
        };

        Some(Self {
            protocol: format!("{scheme}:"),
            host: host.to_string(),
            pathname: pathname.to_string(),
        })
    }

    /// `protocol//host` + `pathname`, the value written to `og:url`.
    pub fn canonical_url(&self) -> String {
        format!("{}//{}{}", self.protocol, self.host, self.pathname)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollBehavior {
    #[default]
    Auto,
    Instant,
    Smooth,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollOptions {
    pub top: f64,
    pub left: f64,
    pub behavior: ScrollBehavior,
}

impl ScrollOptions {
    pub fn smooth_to_top() -> Self {
        Self {
            top: 0.0,
            left: 0.0,
            behavior: ScrollBehavior::Smooth,
        }
    }
}

pub trait Viewport {
    fn location(&self) -> Location;
    fn scroll_to(&mut self, options: ScrollOptions);
}

/// Records scroll requests instead of scrolling.
#[derive(Debug, Clone)]
pub struct MemoryViewport {
    location: Location,
    scrolls: Vec<ScrollOptions>,
}

impl MemoryViewport {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            scrolls: Vec::new(),
        }
    }

    /// Move to another path on the same host, as a client-side route change.
    pub fn push_path(&mut self, pathname: &str) {
        self.location.pathname = pathname.to_string();
    }

    pub fn scrolls(&self) -> &[ScrollOptions] {
        &self.scrolls
    }
}

impl Viewport for MemoryViewport {
    fn location(&self) -> Location {
        self.location.clone()
    }

    fn scroll_to(&mut self, options: ScrollOptions) {
        self.scrolls.push(options);
    }
}
