use stockview::markup::REQUESTED_WITH_HEADER;
use stockview::ViewError;
use tracing::debug;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{FormData, Headers, Request, RequestInit, Response};

use crate::dom;

fn transport(err: JsValue) -> ViewError {
    ViewError::Transport(dom::describe(&err))
}

pub fn form_data(fields: &[(&str, String)]) -> Result<FormData, ViewError> {
    let data = FormData::new().map_err(transport)?;
    for (name, value) in fields {
        data.append_with_str(name, value).map_err(transport)?;
    }
    Ok(data)
}

/// POST `body` to `url` and return the response text. The server reports
/// errors as JSON with a 4xx/5xx status, so the body is returned whatever the
/// status.
pub async fn post_form(url: &str, body: &FormData, requested_with: &str) -> Result<String, ViewError> {
    let window = web_sys::window().ok_or_else(|| ViewError::Transport("no window".to_string()))?;
    let headers = Headers::new().map_err(transport)?;
    headers.set(REQUESTED_WITH_HEADER, requested_with).map_err(transport)?;

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_body(body);
    init.set_headers(&headers);
    let request = Request::new_with_str_and_init(url, &init).map_err(transport)?;

    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(transport)?
        .dyn_into()
        .map_err(transport)?;
    if !response.ok() {
        debug!("{url} answered {}", response.status());
    }
    let text = JsFuture::from(response.text().map_err(transport)?)
        .await
        .map_err(transport)?;
    text.as_string()
        .ok_or_else(|| ViewError::MalformedResponse("response body is not text".to_string()))
}
