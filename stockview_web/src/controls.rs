//! Tabs and form loading indicators.

use stockview::markup::{ACTIVE_CLASS, ATTR_LOADING_TARGET, ATTR_TAB};
use stockview::{activate_tab, TabSurface, ViewConfig};
use tracing::debug;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement};

use crate::dom;

/// Tab buttons and panels, queried afresh on every click.
#[derive(Clone)]
struct PageTabs {
    document: Document,
    button_selector: String,
    content_selector: String,
}

impl TabSurface for PageTabs {
    type Element = Element;

    fn buttons(&self) -> Vec<Element> {
        dom::select_all(&self.document, &self.button_selector)
    }

    fn contents(&self) -> Vec<Element> {
        dom::select_all(&self.document, &self.content_selector)
    }

    fn target(&self, button: &Element) -> Option<String> {
        button.get_attribute(ATTR_TAB)
    }

    fn content_id(&self, content: &Element) -> String {
        content.id()
    }

    fn set_active(&mut self, button: &Element, active: bool) {
        let _ = button.class_list().toggle_with_force(ACTIVE_CLASS, active);
    }

    fn set_visible(&mut self, content: &Element, visible: bool) {
        if let Some(content) = content.dyn_ref::<HtmlElement>() {
            dom::set_display(content, if visible { "block" } else { "none" });
        }
    }
}

pub fn bind_tabs(config: &ViewConfig, document: &Document) {
    let tabs = PageTabs {
        document: document.clone(),
        button_selector: config.tab_button_selector.clone(),
        content_selector: config.tab_content_selector.clone(),
    };
    let buttons = tabs.buttons();
    if buttons.is_empty() || tabs.contents().is_empty() {
        return;
    }
    for button in buttons {
        let mut tabs = tabs.clone();
        let clicked = button.clone();
        dom::listen(&button, "click", move |_| {
            activate_tab(&mut tabs, &clicked);
        });
    }
}

/// Show each form's loading target when the form is submitted.
pub fn bind_loading_indicators(config: &ViewConfig, document: &Document) {
    for form in dom::select_all(document, &config.loading_form_selector) {
        let target = form
            .get_attribute(ATTR_LOADING_TARGET)
            .filter(|id| !id.is_empty())
            .and_then(|id| dom::element_by_id(document, &id));
        let Some(target) = target else {
            debug!("form {:?} has no loading target on the page", form.id());
            continue;
        };
        dom::listen(&form, "submit", move |_| dom::set_display(&target, "flex"));
    }
}
