//! The valuation (DCF) form: out-of-band submit, panel replacement and rebind.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use leptos::spawn_local;
use stockview::markup::ATTR_LISTENER_BOUND;
use stockview::{
    ChartSlot, ChartSpec, PanelSwap, ValuationExchange, ValuationHost, ValuationResult, ViewConfig,
    ViewError,
};
use tracing::debug;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Document, DomParser, Event, FormData, HtmlElement, HtmlFormElement, SupportedType};

use crate::chartjs::CanvasChart;
use crate::{dom, fetch};

/// A submit listener attached to one form element. Dropping it detaches the
/// listener, so a binding never outlives the closure it points to.
struct FormBinding {
    form: HtmlFormElement,
    listener: Closure<dyn FnMut(Event)>,
}

impl Drop for FormBinding {
    fn drop(&mut self) {
        let _ = self
            .form
            .remove_event_listener_with_callback("submit", self.listener.as_ref().unchecked_ref());
    }
}

/// The live page as seen by the exchange.
pub struct ValuationPage {
    document: Document,
    panel_id: String,
    form_selector: String,
    loading_id: String,
    chart: ChartSlot<CanvasChart>,
    bindings: Vec<FormBinding>,
    controller: Weak<RefCell<ValuationController>>,
}

pub struct ValuationController {
    exchange: ValuationExchange,
    page: ValuationPage,
    requested_with: String,
}

impl ValuationHost for ValuationPage {
    type Form = HtmlFormElement;

    fn set_loading(&mut self, visible: bool) {
        if let Some(spinner) = dom::element_by_id(&self.document, &self.loading_id) {
            dom::set_display(&spinner, if visible { "flex" } else { "none" });
        }
    }

    fn swap_panel(&mut self, fragment: &str) -> Result<PanelSwap<HtmlFormElement>, ViewError> {
        let malformed = |err| ViewError::MalformedResponse(dom::describe(&err));
        let parsed = DomParser::new()
            .map_err(malformed)?
            .parse_from_string(fragment, SupportedType::TextHtml)
            .map_err(malformed)?;
        let Some(incoming) = parsed.get_element_by_id(&self.panel_id) else {
            return Ok(PanelSwap::AnchorMissing);
        };
        let current = self
            .document
            .get_element_by_id(&self.panel_id)
            .ok_or_else(|| ViewError::MissingAnchor(self.panel_id.clone()))?;
        let parent = current
            .parent_node()
            .ok_or_else(|| ViewError::MissingAnchor(self.panel_id.clone()))?;

        let incoming = self.document.adopt_node(&incoming).map_err(malformed)?;
        if let Some(panel) = incoming.dyn_ref::<HtmlElement>() {
            dom::set_display(panel, "block");
        }
        parent.replace_child(&incoming, &current).map_err(malformed)?;

        // Listeners of forms that left the document go with them.
        self.bindings.retain(|binding| binding.form.is_connected());

        let form = incoming
            .dyn_ref::<HtmlElement>()
            .and_then(|panel| panel.query_selector(&self.form_selector).ok().flatten())
            .and_then(|form| form.dyn_into::<HtmlFormElement>().ok());
        Ok(PanelSwap::Replaced { form })
    }

    fn bind_form(&mut self, form: HtmlFormElement) {
        if form.get_attribute(ATTR_LISTENER_BOUND).as_deref() == Some("true") {
            return;
        }
        let controller = self.controller.clone();
        let listener = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            event.prevent_default();
            if let Some(controller) = controller.upgrade() {
                submit(&controller, &event);
            }
        });
        if let Err(err) = form.add_event_listener_with_callback("submit", listener.as_ref().unchecked_ref()) {
            debug!("failed to bind valuation form: {}", dom::describe(&err));
            return;
        }
        let _ = form.set_attribute(ATTR_LISTENER_BOUND, "true");
        self.bindings.push(FormBinding { form, listener });
    }

    fn render_valuation(&mut self, results: &ValuationResult) {
        self.chart.render(&ChartSpec::valuation(results));
    }
}

fn submit(controller: &Rc<RefCell<ValuationController>>, event: &Event) {
    let Some(form) = event
        .current_target()
        .and_then(|target| target.dyn_into::<HtmlFormElement>().ok())
    else {
        return;
    };
    let requested_with = {
        let mut guard = controller.borrow_mut();
        let ValuationController {
            exchange,
            page,
            requested_with,
        } = &mut *guard;
        if !exchange.begin(page) {
            return;
        }
        requested_with.clone()
    };

    let body = FormData::new_with_form(&form).map_err(|err| ViewError::Transport(dom::describe(&err)));
    let action = form.action();
    let controller = controller.clone();
    spawn_local(async move {
        let reply = match body {
            Ok(body) => fetch::post_form(&action, &body, &requested_with).await,
            Err(err) => Err(err),
        };
        let mut guard = controller.borrow_mut();
        let ValuationController { exchange, page, .. } = &mut *guard;
        // Failures are logged by the exchange; the page keeps its state.
        let _ = exchange.complete(page, reply);
    });
}

/// Bind the valuation form and draw the initial chart when the page came
/// with precomputed results.
pub fn bind(
    config: &ViewConfig,
    document: &Document,
    initial: Option<&ValuationResult>,
) -> Rc<RefCell<ValuationController>> {
    let controller = Rc::new_cyclic(|me| {
        RefCell::new(ValuationController {
            exchange: ValuationExchange::new(),
            page: ValuationPage {
                document: document.clone(),
                panel_id: config.valuation_panel.clone(),
                form_selector: config.valuation_form_selector(),
                loading_id: config.loading.clone(),
                chart: ChartSlot::new(CanvasChart::new(config.valuation_canvas.as_str())),
                bindings: Vec::new(),
                controller: me.clone(),
            },
            requested_with: config.requested_with.clone(),
        })
    });

    {
        let mut guard = controller.borrow_mut();
        match dom::typed_by_id::<HtmlFormElement>(document, &config.valuation_form) {
            Some(form) => guard.page.bind_form(form),
            None => debug!("no #{} on this page", config.valuation_form),
        }
        if let Some(results) = initial.filter(|r| !r.is_empty()) {
            guard.page.render_valuation(results);
        }
    }
    controller
}
