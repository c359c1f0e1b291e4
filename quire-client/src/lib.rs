//! Browser-side bootstrap for pre-rendered quire sites.
//!
//! After load, server-rendered code blocks are upgraded and highlighted. Each
//! time the application reports a finished route change over the navigation
//! channel, the page's `<meta>` tags are patched for the new page, code is
//! highlighted again and the viewport scrolls back to the top.
//!
//! The DOM and window are reached through the [`Document`] and [`Viewport`]
//! traits. The `web` feature implements both over `web-sys` and exports a
//! `bootstrap()` entry point to JavaScript.

pub mod bootstrap;
pub mod dom;
pub mod highlight;
pub mod window;
#[cfg(feature = "web")]
pub mod web;

pub use bootstrap::{
    BootstrapError, ClientBootstrap, MissingMetaPolicy, NavigationMeta, NavigationReceiver,
    NavigationSender, navigation_channel,
};
pub use dom::{Document, MemoryDocument, NodeId};
pub use highlight::{Highlighter, connect_hljs_pre};
pub use window::{Location, MemoryViewport, ScrollBehavior, ScrollOptions, Viewport};
#[cfg(feature = "web")]
pub use web::{HljsHighlighter, Navigator, WebDocument, WebViewport, bootstrap};
