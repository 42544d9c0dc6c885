//! Chart.js drawing for a [`ChartSlot`](stockview::ChartSlot).

use js_sys::{Array, Function, Reflect};
use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use stockview::{ChartBackend, ChartSpec, ViewError};
use tracing::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::HtmlCanvasElement;

use crate::dom;

/// Draws onto the canvas with the given id using the page's global `Chart`.
pub struct CanvasChart {
    canvas_id: String,
}

impl CanvasChart {
    pub fn new(canvas_id: impl Into<String>) -> Self {
        Self {
            canvas_id: canvas_id.into(),
        }
    }

    fn canvas(&self) -> Result<HtmlCanvasElement, ViewError> {
        dom::document()
            .and_then(|doc| dom::typed_by_id::<HtmlCanvasElement>(&doc, &self.canvas_id))
            .ok_or_else(|| ViewError::MissingAnchor(self.canvas_id.clone()))
    }
}

fn chart_constructor() -> Result<Function, ViewError> {
    Reflect::get(&js_sys::global(), &JsValue::from_str("Chart"))
        .ok()
        .and_then(|ctor| ctor.dyn_into::<Function>().ok())
        .ok_or_else(|| ViewError::Chart("Chart.js is not loaded".to_string()))
}

fn chart_error(err: JsValue) -> ViewError {
    ViewError::Chart(dom::describe(&err))
}

impl ChartBackend for CanvasChart {
    type Handle = JsValue;

    fn ready(&self) -> Result<(), ViewError> {
        self.canvas()?;
        chart_constructor()?;
        Ok(())
    }

    fn create(&mut self, spec: &ChartSpec) -> Result<JsValue, ViewError> {
        let canvas = self.canvas()?;
        let ctor = chart_constructor()?;
        let context = canvas
            .get_context("2d")
            .map_err(chart_error)?
            .ok_or_else(|| ViewError::Chart(format!("#{} has no 2d context", self.canvas_id)))?;
        let config = spec
            .to_chartjs()
            .serialize(&Serializer::json_compatible())
            .map_err(|e| ViewError::Chart(e.to_string()))?;
        let chart = Reflect::construct(&ctor, &Array::of2(&context, &config)).map_err(chart_error)?;
        debug!("drew {} chart {:?} on #{}", spec.kind.as_str(), spec.title, self.canvas_id);
        Ok(chart)
    }

    fn destroy(&mut self, chart: JsValue) {
        let destroy = Reflect::get(&chart, &JsValue::from_str("destroy"))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok());
        match destroy {
            Some(destroy) => {
                if let Err(err) = destroy.call0(&chart) {
                    warn!("failed to destroy chart on #{}: {}", self.canvas_id, dom::describe(&err));
                }
            }
            None => debug!("chart on #{} has no destroy()", self.canvas_id),
        }
    }
}
