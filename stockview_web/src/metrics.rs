//! Metric cards, the shared chart modal and its trend badge panel.

use std::cell::RefCell;
use std::rc::Rc;

use stockview::{
    BadgeSurface, CardConfig, MetricExplorer, MetricSeries, ModalSurface, TrendBadge, TrendMap,
    ViewConfig,
};
use tracing::debug;
use web_sys::{Document, HtmlElement};

use crate::chartjs::CanvasChart;
use crate::dom;

pub type Explorer = MetricExplorer<CanvasChart, BadgePanel, ModalPanel>;

pub struct BadgePanel {
    document: Document,
    container: Option<HtmlElement>,
}

impl BadgePanel {
    pub fn new(document: &Document, id: &str) -> Self {
        Self {
            document: document.clone(),
            container: dom::element_by_id(document, id),
        }
    }
}

impl BadgeSurface for BadgePanel {
    fn clear(&mut self) {
        if let Some(container) = &self.container {
            container.set_inner_html("");
        }
    }

    fn set_visible(&mut self, visible: bool) {
        if let Some(container) = &self.container {
            dom::set_display(container, if visible { "flex" } else { "none" });
        }
    }

    fn append(&mut self, badge: &TrendBadge) {
        let Some(container) = &self.container else {
            return;
        };
        let Ok(element) = self.document.create_element("div") else {
            debug!("failed to create trend badge");
            return;
        };
        let classes = element.class_list();
        let _ = classes.add_1(TrendBadge::BASE_CLASS);
        if let Some(tone) = badge.tone.class() {
            let _ = classes.add_1(tone);
        }
        element.set_text_content(Some(&badge.text()));
        let _ = container.append_child(&element);
    }
}

pub struct ModalPanel {
    root: Option<HtmlElement>,
    title: Option<HtmlElement>,
}

impl ModalSurface for ModalPanel {
    fn set_title(&mut self, title: &str) {
        if let Some(element) = &self.title {
            element.set_text_content(Some(title));
        }
    }

    fn set_open(&mut self, open: bool) {
        if let Some(root) = &self.root {
            dom::set_display(root, if open { "flex" } else { "none" });
        }
    }
}

/// Bind every metric card, the modal close control and backdrop clicks.
pub fn bind(
    config: &ViewConfig,
    document: &Document,
    series: MetricSeries,
    trends: TrendMap,
) -> Rc<RefCell<Explorer>> {
    let root = dom::element_by_id(document, &config.modal);
    let modal = ModalPanel {
        root: root.clone(),
        title: dom::element_by_id(document, &config.modal_title),
    };
    let explorer = Rc::new(RefCell::new(MetricExplorer::new(
        series,
        trends,
        CanvasChart::new(config.metric_canvas.as_str()),
        BadgePanel::new(document, &config.trend_badges),
        modal,
    )));

    if let Ok(Some(close)) = document.query_selector(&config.modal_close_selector) {
        let explorer = explorer.clone();
        dom::listen(&close, "click", move |_| explorer.borrow_mut().close());
    }

    if let (Some(window), Some(root)) = (web_sys::window(), root) {
        let explorer = explorer.clone();
        dom::listen(&window, "click", move |event| {
            let on_backdrop = event
                .target()
                .is_some_and(|target| js_sys::Object::is(&target, &root));
            if on_backdrop {
                explorer.borrow_mut().close();
            }
        });
    }

    let cards = dom::select_all(document, &config.card_selector);
    debug!("binding {} metric cards", cards.len());
    for card in cards {
        let explorer = explorer.clone();
        let source = card.clone();
        dom::listen(&card, "click", move |_| {
            match CardConfig::from_attributes(|name| source.get_attribute(name)) {
                Some(config) => explorer.borrow_mut().open(&config),
                None => debug!("card without metric, chart type or title; click ignored"),
            }
        });
    }

    explorer
}
