#![cfg(target_arch = "wasm32")]
//! Framekit Web - WebAssembly bindings
//!
//! Browser implementations of the `framekit-lib` platform traits, plus the
//! JavaScript entry points:
//!
//! - `FrameService` for the host page
//! - `runDispatchFrame` for the dispatch frame page
//! - `runRedirectFrame` / `runCancelFrame` for the landing pages

use wasm_bindgen::prelude::*;

mod browser;
mod pages;
mod service;
mod utils;

pub use browser::{
    BrowserDispatchContext, BrowserPopupContext, BrowserPopupWindow, BrowserWindowOpener,
    DocumentFrameHost, JsPopupBridge, MessageListener, WebScheduler, WindowTransport,
};
pub use pages::{run_cancel_frame, run_dispatch_frame_page, run_redirect_frame, DispatchFramePage, LandingPage};
pub use service::WasmFrameService;
pub use utils::origin_of;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    utils::log("Framekit WASM module initialized");
}

/// Get the version of the Framekit WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
