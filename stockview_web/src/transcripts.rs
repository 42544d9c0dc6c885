//! Earnings call transcripts and their on-demand summaries.

use std::cell::RefCell;
use std::rc::Rc;

use leptos::*;
use stockview::{
    decode_summary_reply, SummaryRequest, SummaryView, TranscriptRecord, TranscriptSelector,
    ViewConfig,
};
use tracing::debug;
use web_sys::{Document, HtmlInputElement, HtmlSelectElement};

use crate::{dom, fetch};

#[component]
fn TranscriptBody(records: Rc<Vec<TranscriptRecord>>, selected: RwSignal<usize>) -> impl IntoView {
    move || {
        records.get(selected.get()).map(|record| {
            let turns = record
                .turns()
                .map(|(speaker, text)| {
                    view! { <p><strong>{format!("{speaker}:")}</strong>" "{text.to_string()}</p> }
                })
                .collect_view();
            view! {
                <p><strong>"Period:"</strong>" "{record.period_label()}</p>
                <div class="transcript">{turns}</div>
            }
        })
    }
}

struct SummaryEndpoint {
    url: String,
    requested_with: String,
}

fn request_summary(
    selector: &Rc<RefCell<TranscriptSelector>>,
    endpoint: &Rc<SummaryEndpoint>,
    request: SummaryRequest,
    summary: RwSignal<SummaryView>,
) {
    summary.set(SummaryView::Pending);
    let selector = selector.clone();
    let endpoint = endpoint.clone();
    spawn_local(async move {
        let reply = match fetch::form_data(&request.form_fields()) {
            Ok(body) => fetch::post_form(&endpoint.url, &body, &endpoint.requested_with).await,
            Err(err) => Err(err),
        };
        let view = decode_summary_reply(reply);
        if selector.borrow().accepts(request.ticket) {
            summary.set(view);
        } else {
            debug!(
                "discarding stale summary for Q{} {}",
                request.quarter, request.year
            );
        }
    });
}

/// Render the selected transcript into the content element and wire the
/// select control and the summary button.
pub fn bind(config: &ViewConfig, document: &Document, records: Vec<TranscriptRecord>) {
    let Some(content) = dom::element_by_id(document, &config.transcript_content) else {
        debug!("no #{}; transcripts inactive", config.transcript_content);
        return;
    };
    let select = dom::typed_by_id::<HtmlSelectElement>(document, &config.transcript_select);
    let Some(selector) = TranscriptSelector::new(records, select.as_ref().map(|s| s.value()).as_deref()) else {
        return;
    };
    let summary_el = dom::element_by_id(document, &config.summary_content);
    let button = dom::element_by_id(document, &config.summary_button);
    let ticker = dom::typed_by_id::<HtmlInputElement>(document, &config.ticker_input);
    let endpoint = Rc::new(SummaryEndpoint {
        url: config.summary_endpoint.clone(),
        requested_with: config.requested_with.clone(),
    });

    let records = Rc::new(selector.records().to_vec());
    let initial = selector.selected_index();
    let selector = Rc::new(RefCell::new(selector));

    content.set_inner_html("");
    mount_to(content, move || {
        let selected = create_rw_signal(initial);
        let summary = create_rw_signal(SummaryView::Empty);

        let can_summarize = summary_el.is_some();
        create_effect(move |_| {
            let html = summary.with(SummaryView::to_html);
            if let Some(el) = &summary_el {
                el.set_inner_html(&html);
            }
        });

        if let Some(select) = select.clone() {
            let selector = selector.clone();
            let source = select.clone();
            dom::listen(&select, "change", move |_| {
                let changed = selector.borrow_mut().select(&source.value());
                match changed {
                    Some(index) => {
                        selected.set(index);
                        summary.set(SummaryView::Empty);
                    }
                    None => debug!("no transcript at {:?}", source.value()),
                }
            });
        }

        if let (Some(button), Some(ticker), true) = (button, ticker, can_summarize) {
            let selector = selector.clone();
            dom::listen(&button, "click", move |_| {
                let control = select.as_ref().map(|s| s.value());
                let request = selector
                    .borrow_mut()
                    .request_summary(&ticker.value(), control.as_deref());
                match request {
                    Ok(request) => request_summary(&selector, &endpoint, request, summary),
                    Err(view) => summary.set(view),
                }
            });
        }

        view! { <TranscriptBody records=records selected=selected/> }
    });
}
