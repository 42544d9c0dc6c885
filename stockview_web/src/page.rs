//! Page startup: config, logging, payloads and feature binding.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use stockview::config::CONFIG_PAYLOAD_ID;
use stockview::{PagePayloads, ViewConfig};
use tracing::{debug, info, warn};
use web_sys::Document;

use crate::{controls, dom, logging, metrics, transcripts, valuation, APP_COMMIT, APP_VERSION};

thread_local! {
    /// Components that own page state. Some listeners only hold weak handles,
    /// so the components are kept here for the lifetime of the page.
    static COMPONENTS: RefCell<Vec<Rc<dyn Any>>> = const { RefCell::new(Vec::new()) };
}

fn keep(component: Rc<dyn Any>) {
    COMPONENTS.with(|held| held.borrow_mut().push(component));
}

/// Run [`init`] once the document is parsed.
pub fn boot() {
    let Some(document) = dom::document() else {
        return;
    };
    if document.ready_state() == "loading" {
        let ready = document.clone();
        dom::listen(&document, "DOMContentLoaded", move |_| init(&ready));
    } else {
        init(&document);
    }
}

fn init(document: &Document) {
    let raw_config = dom::text_of(document, CONFIG_PAYLOAD_ID);
    let parsed = raw_config
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ViewConfig::from_json);
    let config = match &parsed {
        Some(Ok(config)) => config.clone(),
        _ => ViewConfig::default(),
    };
    logging::init(&config.log_level);
    if let Some(Err(err)) = parsed {
        warn!("ignoring #{CONFIG_PAYLOAD_ID}: {err}");
    }
    info!("stockview {APP_VERSION} ({APP_COMMIT})");

    controls::bind_loading_indicators(&config, document);
    controls::bind_tabs(&config, document);

    let payloads = PagePayloads::collect(&config, |id| dom::text_of(document, id));

    match payloads.metrics {
        Some(series) => {
            keep(metrics::bind(&config, document, series, payloads.trends));
        }
        None => debug!("no historical metrics; metric cards inactive"),
    }

    keep(valuation::bind(&config, document, payloads.valuation.as_ref()));

    match payloads.transcripts {
        Some(records) => transcripts::bind(&config, document, records),
        None => debug!("no transcripts; transcript viewer inactive"),
    }
}
