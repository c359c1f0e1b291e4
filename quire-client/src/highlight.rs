use log::debug;

use crate::dom::{Document, NodeId};

/// Marker the highlighter leaves on blocks it already processed.
pub const HIGHLIGHTED_ATTR: &str = "data-highlighted";

/// Code blocks the bootstrap highlights.
pub const CODE_BLOCK_SELECTOR: &str = "hljs-pre code";

/// Custom element wrapping server-rendered code.
pub const HLJS_PRE_TAG: &str = "hljs-pre";

/// A syntax highlighter working on one `<code>` element at a time.
pub trait Highlighter {
    fn highlight_block(&mut self, document: &mut dyn Document, block: NodeId);
}

impl<F> Highlighter for F
where
    F: FnMut(&mut dyn Document, NodeId),
{
    fn highlight_block(&mut self, document: &mut dyn Document, block: NodeId) {
        self(document, block)
    }
}

/// Attach a `<code>` child to every `hljs-pre` element that has none yet:
/// its class is the element's `class` and its markup is the `value`
/// attribute. Returns how many elements were upgraded.
pub fn connect_hljs_pre<D: Document + ?Sized>(document: &mut D) -> usize {
    let mut upgraded = 0;
    for pre in document.query_selector_all(HLJS_PRE_TAG) {
        let has_code = document
            .children(pre)
            .into_iter()
            .any(|child| document.tag_name(child) == "code");
        if has_code {
            continue;
        }

        let lang = document.get_attribute(pre, "class").unwrap_or_default();
        let value = document.get_attribute(pre, "value").unwrap_or_default();

        let code = document.create_element("code");
        document.set_inner_html(code, &value);
        document.set_attribute(code, "class", &lang);
        document.append_child(pre, code);
        upgraded += 1;
    }
    upgraded
}

/// Highlight every block matching `selector` that is not flagged yet.
pub fn highlight_all<D, H>(document: &mut D, highlighter: &mut H, selector: &str) -> usize
where
    D: Document,
    H: Highlighter + ?Sized,
{
    let mut count = 0;
    for block in document.query_selector_all(selector) {
        if document.get_attribute(block, HIGHLIGHTED_ATTR).is_some() {
            continue;
        }
        highlighter.highlight_block(document, block);
        document.set_attribute(block, HIGHLIGHTED_ATTR, "yes");
        count += 1;
    }
    debug!(target: "client", "highlighted {count} blocks");
    count
}

/// Drop the processed flag so the next pass sees every block again.
pub fn clear_highlighted<D: Document + ?Sized>(document: &mut D, selector: &str) {
    for block in document.query_selector_all(selector) {
        document.remove_attribute(block, HIGHLIGHTED_ATTR);
    }
}
