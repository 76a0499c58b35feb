// ==================== Imports ====================
use std::cell::RefCell;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsValue;

mod browser;
pub mod config;
pub mod embed;
pub mod error;
pub mod gate;

pub use config::{EmbedConfig, PageConfig};
pub use embed::{EmbedController, EmbedHandle};
pub use error::EmbedError;

use once_cell::sync::OnceCell;

/// Static page configuration served next to the bundle.
const PAGE_CONFIG_PATH: &str = "page-config.json";

static LOGGER: OnceCell<()> = OnceCell::new();

thread_local! {
    // the rendered page owns the embed; it lives as long as the tab
    static PAGE: RefCell<Option<gate::page::GatedPage>> = const { RefCell::new(None) };
}

fn init_logging() {
    LOGGER.get_or_init(|| {
        // setup better panic messages for debugging
        console_error_panic_hook::set_once();
        if let Err(err) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("logger already set: {err}").into());
        }
    });
}

// ==================== Main Functions ====================
/// Main entry for the WebAssembly module
/// - fetches page configuration
/// - resolves the visitor's entitlement
/// - renders either the game or the checkout prompt
#[wasm_bindgen(start)]
pub fn main_js() -> Result<(), JsValue> {
    init_logging();

    browser::spawn_local(async move {
        let config = match browser::fetch_json::<PageConfig>(PAGE_CONFIG_PATH).await {
            Ok(config) => config,
            Err(err) => {
                log::warn!("using default page config, {PAGE_CONFIG_PATH} unavailable: {err:#}");
                PageConfig::default()
            }
        };

        match gate::page::load(&config).await {
            Ok(page) => PAGE.with(|slot| *slot.borrow_mut() = Some(page)),
            Err(err) => log::error!("could not render gated page: {err:#}"),
        }
    });

    Ok(())
}
