//! Browser side of the embed: the canvas host, canvas sizing and the mobile
//! viewport tag.
use super::layout::{Size, Sizing};
use super::runtime::Host;
use crate::browser;
use anyhow::{anyhow, Result};
use futures::future::LocalBoxFuture;
use std::cell::Cell;
use web_sys::{HtmlCanvasElement, HtmlElement, HtmlMetaElement};

// ==================== Host ====================

pub struct DomHost {
    canvas: HtmlCanvasElement,
}

impl DomHost {
    pub fn new(canvas: HtmlCanvasElement) -> Self {
        Self { canvas }
    }

    fn set_visibility(&self, value: &str) {
        if let Err(err) = self.canvas.style().set_property("visibility", value) {
            log::warn!("could not set canvas visibility : {:#?}", err);
        }
    }
}

impl Host for DomHost {
    fn supports_webgl(&self) -> bool {
        browser::supports_webgl()
    }

    fn show_canvas(&self) {
        self.set_visibility("visible");
    }

    fn hide_canvas(&self) {
        self.set_visibility("hidden");
    }

    fn focus_canvas(&self) {
        let _ = self.canvas.focus();
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        browser::spawn_local(task);
    }

    fn sleep(&self, millis: u32) -> LocalBoxFuture<'static, ()> {
        browser::sleep(millis)
    }
}

// ==================== Sizing ====================

/// Applies [`Sizing`] to the canvas, reading the stage's current width.
pub struct CanvasSizer {
    canvas: HtmlCanvasElement,
    stage: HtmlElement,
    sizing: Sizing,
    dimensions: Cell<(u32, u32)>,
}

impl CanvasSizer {
    pub fn new(
        canvas: HtmlCanvasElement,
        stage: HtmlElement,
        sizing: Sizing,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            canvas,
            stage,
            sizing,
            dimensions: Cell::new((width, height)),
        }
    }

    pub fn sizing(&self) -> Sizing {
        self.sizing
    }

    pub fn set_dimensions(&self, width: u32, height: u32) {
        if self.dimensions.replace((width, height)) != (width, height) {
            self.apply();
        }
    }

    pub fn apply(&self) {
        let (width, height) = self.dimensions.get();
        let container_width = f64::from(self.stage.client_width());
        let size = self.sizing.canvas_size(container_width, width, height);
        if let Err(err) = self.set_size(size) {
            log::warn!("{err:#}");
        }
    }

    fn set_size(&self, size: Size) -> Result<()> {
        let style = self.canvas.style();
        style
            .set_property("width", &format!("{}px", size.width))
            .and_then(|_| style.set_property("height", &format!("{}px", size.height)))
            .map_err(|err| anyhow!("could not size canvas : {:#?}", err))
    }
}

// ==================== Viewport ====================

const MOBILE_AGENTS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

pub fn is_touch_mobile(user_agent: &str) -> bool {
    let agent = user_agent.to_lowercase();
    MOBILE_AGENTS.iter().any(|needle| agent.contains(needle))
}

/// A `<meta name="viewport">` this crate added; removed again on drop.
pub struct ViewportMeta {
    element: HtmlMetaElement,
}

impl ViewportMeta {
    pub const CONTENT: &'static str = "width=device-width, initial-scale=1.0, user-scalable=no";

    /// Adds the tag on touch devices whose page does not declare a viewport.
    pub fn inject_if_needed(user_agent: &str) -> Result<Option<Self>> {
        if !is_touch_mobile(user_agent) {
            return Ok(None);
        }
        if browser::query_selector("meta[name=\"viewport\"]")?.is_some() {
            return Ok(None);
        }
        let element = browser::create_element::<HtmlMetaElement>("meta")?;
        element.set_name("viewport");
        element.set_content(Self::CONTENT);
        browser::document()?
            .head()
            .ok_or_else(|| anyhow!("No <head> for viewport meta"))?
            .append_child(&element)
            .map_err(|err| anyhow!("Could not add viewport meta : {:#?}", err))?;
        log::debug!("added viewport meta for touch device");
        Ok(Some(Self { element }))
    }
}

impl Drop for ViewportMeta {
    fn drop(&mut self) {
        self.element.remove();
    }
}
