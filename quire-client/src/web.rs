//! Browser binding over `web-sys`, enabled with the `web` feature.
//!
//! ```javascript
//! import init, { bootstrap } from './pkg/quire_client.js';
//!
//! await init();
//! const navigator = bootstrap();
//!
//! // once the new route is in the DOM
//! await navigator.afterNavigate({ title, description, image });
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use log::{error, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::{Element, ScrollToOptions, Window};

use crate::bootstrap::{ClientBootstrap, NavigationMeta, NavigationSender, navigation_channel};
use crate::dom::{Document, NodeArena, NodeId};
use crate::highlight::Highlighter;
use crate::window::{Location, ScrollBehavior, ScrollOptions, Viewport};

/// Navigations the application may queue before `afterNavigate` waits.
const NAVIGATION_BUFFER: usize = 16;

type SharedArena = Rc<RefCell<NodeArena<Element>>>;

/// [`Document`] backed by the page's `window.document`.
pub struct WebDocument {
    document: web_sys::Document,
    nodes: SharedArena,
}

impl WebDocument {
    pub fn new(document: web_sys::Document) -> Self {
        Self {
            document,
            nodes: Rc::new(RefCell::new(NodeArena::new())),
        }
    }

    /// A highlighter that resolves this document's ids to live elements.
    pub fn hljs(&self) -> HljsHighlighter {
        HljsHighlighter {
            nodes: Rc::clone(&self.nodes),
        }
    }

    fn intern(&self, element: Element) -> NodeId {
        self.nodes.borrow_mut().intern(element)
    }

    fn element(&self, node: NodeId) -> Option<Element> {
        self.nodes.borrow().get(node).cloned()
    }
}

impl Document for WebDocument {
    fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        let list = match self.document.query_selector_all(selector) {
            Ok(list) => list,
            Err(e) => {
                warn!(target: "client", "invalid selector `{selector}`: {e:?}");
                return Vec::new();
            }
        };

        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .map(|element| self.intern(element))
            .collect()
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.element(node)
            .map(|element| element.tag_name().to_ascii_lowercase())
            .unwrap_or_default()
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        let Some(element) = self.element(node) else {
            return Vec::new();
        };
        let children = element.children();
        (0..children.length())
            .filter_map(|i| children.item(i))
            .map(|child| self.intern(child))
            .collect()
    }

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)?.get_attribute(name)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(element) = self.element(node)
            && let Err(e) = element.set_attribute(name, value)
        {
            warn!(target: "client", "could not set `{name}`: {e:?}");
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(element) = self.element(node)
            && let Err(e) = element.remove_attribute(name)
        {
            warn!(target: "client", "could not remove `{name}`: {e:?}");
        }
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        // Only an invalid tag name fails; surface it as the DOM exception.
        let element = self
            .document
            .create_element(tag)
            .unwrap_or_else(|e| wasm_bindgen::throw_val(e));
        self.intern(element)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let (Some(parent), Some(child)) = (self.element(parent), self.element(child)) else {
            return;
        };
        if let Err(e) = parent.append_child(&child) {
            warn!(target: "client", "could not append <{}>: {e:?}", child.tag_name());
        }
    }

    fn inner_html(&self, node: NodeId) -> String {
        self.element(node)
            .map(|element| element.inner_html())
            .unwrap_or_default()
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) {
        if let Some(element) = self.element(node) {
            element.set_inner_html(html);
        }
    }
}

/// [`Viewport`] backed by `window`.
pub struct WebViewport {
    window: Window,
}

impl WebViewport {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl Viewport for WebViewport {
    fn location(&self) -> Location {
        let location = self.window.location();
        Location {
            protocol: location.protocol().unwrap_or_default(),
            host: location.host().unwrap_or_default(),
            pathname: location.pathname().unwrap_or_default(),
        }
    }

    fn scroll_to(&mut self, options: ScrollOptions) {
        let scroll = ScrollToOptions::new();
        scroll.set_top(options.top);
        scroll.set_left(options.left);
        scroll.set_behavior(match options.behavior {
            ScrollBehavior::Auto => web_sys::ScrollBehavior::Auto,
            ScrollBehavior::Instant => web_sys::ScrollBehavior::Instant,
            ScrollBehavior::Smooth => web_sys::ScrollBehavior::Smooth,
        });
        self.window.scroll_to_with_scroll_to_options(&scroll);
    }
}

#[wasm_bindgen]
extern "C" {
    /// highlight.js, loaded by the page as the global `hljs`.
    #[wasm_bindgen(js_namespace = hljs, js_name = highlightElement)]
    fn highlight_element(element: &Element);
}

/// Runs `hljs.highlightElement` on each block.
pub struct HljsHighlighter {
    nodes: SharedArena,
}

impl Highlighter for HljsHighlighter {
    fn highlight_block(&mut self, _document: &mut dyn Document, block: NodeId) {
        let element = self.nodes.borrow().get(block).cloned();
        if let Some(element) = element {
            highlight_element(&element);
        }
    }
}

/// The application's handle to the running bootstrap.
#[wasm_bindgen]
pub struct Navigator {
    sender: NavigationSender,
}

#[wasm_bindgen]
impl Navigator {
    /// Report a finished route change with `{ title, description, image }`.
    /// Rejects when the payload is malformed or the bootstrap has stopped.
    #[wasm_bindgen(js_name = afterNavigate)]
    pub fn after_navigate(&self, meta: JsValue) -> js_sys::Promise {
        let sender = self.sender.clone();
        future_to_promise(async move {
            let meta: NavigationMeta = serde_wasm_bindgen::from_value(meta)?;
            sender
                .after_navigate(meta)
                .await
                .map_err(|e| JsError::new(&e.to_string()))?;
            Ok(JsValue::UNDEFINED)
        })
    }
}

/// Upgrade and highlight the pre-rendered page, then listen for route
/// changes in the background.
#[wasm_bindgen]
pub fn bootstrap() -> Result<Navigator, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsError::new("no global `window`"))?;
    let document = window
        .document()
        .ok_or_else(|| JsError::new("no `document` on window"))?;

    let document = WebDocument::new(document);
    let highlighter = document.hljs();
    let mut client = ClientBootstrap::new(document, WebViewport::new(window), highlighter);
    client.on_load();

    let (sender, receiver) = navigation_channel(NAVIGATION_BUFFER);
    spawn_local(async move {
        if let Err(e) = client.run(receiver).await {
            error!(target: "client", "{e}");
        }
    });
    Ok(Navigator { sender })
}
