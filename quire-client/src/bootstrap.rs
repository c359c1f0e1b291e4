use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::dom::Document;
use crate::highlight::{
    CODE_BLOCK_SELECTOR, Highlighter, clear_highlighted, connect_hljs_pre, highlight_all,
};
use crate::window::{ScrollOptions, Viewport};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("no element matches `{selector}`")]
    MissingMeta { selector: String },
    #[error("the bootstrap is no longer listening for navigations")]
    Closed,
}

/// Page metadata the application reports after a route change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationMeta {
    pub title: String,
    pub description: String,
    pub image: String,
}

/// What to do when a `<meta>` element the bootstrap updates is not in the
/// page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingMetaPolicy {
    /// Stop handling the navigation with [`BootstrapError::MissingMeta`].
    Strict,
    /// Log a warning and carry on with the remaining steps.
    Lenient,
}

impl Default for MissingMetaPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            MissingMetaPolicy::Strict
        } else {
            MissingMetaPolicy::Lenient
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MetaField {
    Url,
    Title,
    Description,
    Image,
}

struct MetaTarget {
    selector: &'static str,
    field: MetaField,
    /// Only some pages carry it; never an error when absent.
    optional: bool,
}

const fn target(selector: &'static str, field: MetaField) -> MetaTarget {
    MetaTarget {
        selector,
        field,
        optional: false,
    }
}

const META_TARGETS: &[MetaTarget] = &[
    target(r#"meta[property="og:url"]"#, MetaField::Url),
    target(r#"meta[name="twitter:title"]"#, MetaField::Title),
    target(r#"meta[property="og:title"]"#, MetaField::Title),
    target(r#"meta[name="description"]"#, MetaField::Description),
    target(r#"meta[name="twitter:description"]"#, MetaField::Description),
    target(r#"meta[property="og:description"]"#, MetaField::Description),
    target(r#"meta[name="twitter:image"]"#, MetaField::Image),
    target(r#"meta[property="og:image"]"#, MetaField::Image),
    MetaTarget {
        selector: r#"meta[name="image"]"#,
        field: MetaField::Image,
        optional: true,
    },
];

/// A bounded channel from the application to the bootstrap.
pub fn navigation_channel(buffer: usize) -> (NavigationSender, NavigationReceiver) {
    let (tx, rx) = mpsc::channel(buffer);
    (NavigationSender { tx }, NavigationReceiver { rx })
}

/// Held by the application.
#[derive(Debug, Clone)]
pub struct NavigationSender {
    tx: mpsc::Sender<NavigationMeta>,
}

impl NavigationSender {
    /// Report a finished route change. Send this only once the new page is
    /// in the DOM; the bootstrap patches and highlights right away.
    pub async fn after_navigate(&self, meta: NavigationMeta) -> Result<(), BootstrapError> {
        self.tx.send(meta).await.map_err(|_| BootstrapError::Closed)
    }
}

#[derive(Debug)]
pub struct NavigationReceiver {
    rx: mpsc::Receiver<NavigationMeta>,
}

/// Browser-side glue between the pre-rendered page and the running
/// application.
pub struct ClientBootstrap<D, V, H> {
    document: D,
    viewport: V,
    highlighter: H,
    policy: MissingMetaPolicy,
    code_selector: String,
}

impl<D, V, H> ClientBootstrap<D, V, H>
where
    D: Document,
    V: Viewport,
    H: Highlighter,
{
    pub fn new(document: D, viewport: V, highlighter: H) -> Self {
        Self {
            document,
            viewport,
            highlighter,
            policy: MissingMetaPolicy::default(),
            code_selector: CODE_BLOCK_SELECTOR.to_string(),
        }
    }

    pub fn policy(mut self, policy: MissingMetaPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn code_selector<S: Into<String>>(mut self, selector: S) -> Self {
        self.code_selector = selector.into();
        self
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    /// For the application to update the page between navigations.
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    pub fn into_parts(self) -> (D, V, H) {
        (self.document, self.viewport, self.highlighter)
    }

    /// Upgrade the server-rendered code blocks and highlight them.
    pub fn on_load(&mut self) -> usize {
        connect_hljs_pre(&mut self.document);
        highlight_all(&mut self.document, &mut self.highlighter, &self.code_selector)
    }

    /// Patch meta tags for the new page, re-highlight, scroll to the top.
    pub fn after_navigate(&mut self, meta: &NavigationMeta) -> Result<(), BootstrapError> {
        self.update_meta(meta)?;

        connect_hljs_pre(&mut self.document);
        clear_highlighted(&mut self.document, &self.code_selector);
        highlight_all(&mut self.document, &mut self.highlighter, &self.code_selector);

        self.viewport.scroll_to(ScrollOptions::smooth_to_top());
        Ok(())
    }

    fn update_meta(&mut self, meta: &NavigationMeta) -> Result<(), BootstrapError> {
        let url = self.viewport.location().canonical_url();
        debug!(target: "client", "navigated to {url}");

        for target in META_TARGETS {
            let value = match target.field {
                MetaField::Url => url.as_str(),
                MetaField::Title => meta.title.as_str(),
                MetaField::Description => meta.description.as_str(),
                MetaField::Image => meta.image.as_str(),
            };

            match self.document.query_selector(target.selector) {
                Some(node) => self.document.set_attribute(node, "content", value),
                None if target.optional => {}
                None => match self.policy {
                    MissingMetaPolicy::Strict => {
                        return Err(BootstrapError::MissingMeta {
                            selector: target.selector.to_string(),
                        });
                    }
                    MissingMetaPolicy::Lenient => {
                        warn!(target: "client", "no element matches `{}`, skipped", target.selector);
                    }
                },
            }
        }
        Ok(())
    }

    /// Handle navigations until every sender is gone. Returns how many were
    /// handled.
    pub async fn run(&mut self, mut navigations: NavigationReceiver) -> Result<usize, BootstrapError> {
        let mut handled = 0;
        while let Some(meta) = navigations.rx.recv().await {
            self.after_navigate(&meta)?;
            handled += 1;
        }
        Ok(handled)
    }
}
