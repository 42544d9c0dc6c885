//! Browser side of the stock analysis result page.
//!
//! Binds the server-rendered markup to the `stockview` logic: the metric cards
//! and their chart modal, the asynchronous valuation form, the transcript
//! viewer, tabs and form loading indicators.
//!
//! ```bash
//! wasm-pack build stockview_web --target web
//! ```

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_COMMIT: &str = env!("STOCKVIEW_COMMIT");

#[cfg(target_arch = "wasm32")]
mod chartjs;
#[cfg(target_arch = "wasm32")]
mod controls;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod fetch;
#[cfg(target_arch = "wasm32")]
mod logging;
#[cfg(target_arch = "wasm32")]
mod metrics;
#[cfg(target_arch = "wasm32")]
mod page;
#[cfg(target_arch = "wasm32")]
mod transcripts;
#[cfg(target_arch = "wasm32")]
mod valuation;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console-panic")]
    console_error_panic_hook::set_once();
    page::boot();
}
