use super::state::{EmbedState, LoadState};
use crate::browser;
use crate::config::EmbedConfig;
use anyhow::{anyhow, Result};
use web_sys::{HtmlButtonElement, HtmlCanvasElement, HtmlDivElement, HtmlElement};

/// Which parts of the embed chrome are visible for a given state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panels {
    pub progress_percent: Option<u32>,
    pub error: Option<String>,
    pub controls: bool,
}

impl From<&EmbedState> for Panels {
    fn from(state: &EmbedState) -> Self {
        Self {
            progress_percent: state.loading.then(|| state.display_percent()),
            error: state.error.clone(),
            controls: state.load_state() == LoadState::Ready,
        }
    }
}

/// DOM tree of one embed:
///
/// ```text
/// root
/// ├── header   title, Restart, Fullscreen   (ready only)
/// ├── alert    error text, dismiss          (errored only)
/// ├── stage
/// │   ├── canvas                            (always present)
/// │   └── overlay  progress panel           (loading only)
/// └── footer   product name and version     (ready only)
/// ```
pub struct EmbedView {
    pub root: HtmlDivElement,
    pub stage: HtmlDivElement,
    pub canvas: HtmlCanvasElement,
    pub restart_button: HtmlButtonElement,
    pub fullscreen_button: HtmlButtonElement,
    pub dismiss_button: HtmlButtonElement,
    header: HtmlDivElement,
    footer: HtmlDivElement,
    alert: HtmlDivElement,
    alert_text: HtmlDivElement,
    overlay: HtmlDivElement,
    bar: HtmlDivElement,
    percent_label: HtmlDivElement,
}

impl EmbedView {
    pub fn new(config: &EmbedConfig) -> Result<Self> {
        let root = div("unity-embed", "position:relative;width:100%;")?;

        let header = div(
            "unity-embed__header",
            "display:flex;align-items:center;justify-content:space-between;padding:8px;",
        )?;
        let title = div("unity-embed__title", "font-weight:600;")?;
        title.set_text_content(Some(config.title.as_deref().unwrap_or(&config.product_name)));
        let restart_button = button("Restart")?;
        let fullscreen_button = button("Fullscreen")?;
        let actions = div("unity-embed__actions", "display:flex;gap:8px;")?;
        append(&actions, &restart_button)?;
        append(&actions, &fullscreen_button)?;
        append(&header, &title)?;
        append(&header, &actions)?;

        let alert = div(
            "unity-embed__alert",
            "display:flex;justify-content:space-between;padding:12px;margin:8px 0;\
             border:1px solid #dc2626;border-radius:6px;color:#991b1b;background:#fef2f2;",
        )?;
        alert.set_attribute("role", "alert").map_err(js_err)?;
        let alert_text = div("unity-embed__alert-text", "")?;
        let dismiss_button = button("Dismiss")?;
        append(&alert, &alert_text)?;
        append(&alert, &dismiss_button)?;

        let stage = div("unity-embed__stage", "position:relative;width:100%;")?;
        let canvas = browser::create_canvas()?;
        canvas.set_id("unity-canvas");
        canvas.set_tab_index(0);
        canvas
            .style()
            .set_property("display", "block")
            .and_then(|_| canvas.style().set_property("visibility", "hidden"))
            .map_err(js_err)?;

        let overlay = div(
            "unity-embed__overlay",
            "position:absolute;inset:0;display:flex;align-items:center;justify-content:center;\
             background:rgba(0,0,0,0.6);",
        )?;
        let panel = div(
            "unity-embed__panel",
            "background:#fff;border-radius:8px;padding:24px;min-width:240px;text-align:center;",
        )?;
        let heading = div("unity-embed__loading", "margin-bottom:12px;")?;
        heading.set_text_content(Some(&format!("Loading {}...", config.product_name)));
        let track = div(
            "unity-embed__track",
            "height:8px;background:#e5e7eb;border-radius:4px;overflow:hidden;",
        )?;
        let bar = div("unity-embed__bar", "height:100%;background:#2563eb;width:1%;")?;
        let percent_label = div("unity-embed__percent", "margin-top:8px;font-size:12px;")?;
        append(&track, &bar)?;
        append(&panel, &heading)?;
        append(&panel, &track)?;
        append(&panel, &percent_label)?;
        append(&overlay, &panel)?;
        append(&stage, &canvas)?;
        append(&stage, &overlay)?;

        let footer = div(
            "unity-embed__footer",
            "display:flex;justify-content:space-between;padding:8px;font-size:12px;",
        )?;
        footer.set_text_content(Some(&format!(
            "{} v{}",
            config.product_name, config.product_version
        )));

        append(&root, &header)?;
        append(&root, &alert)?;
        append(&root, &stage)?;
        append(&root, &footer)?;

        Ok(Self {
            root,
            stage,
            canvas,
            restart_button,
            fullscreen_button,
            dismiss_button,
            header,
            footer,
            alert,
            alert_text,
            overlay,
            bar,
            percent_label,
        })
    }

    pub fn render(&self, state: &EmbedState) {
        let panels = Panels::from(state);

        show(&self.overlay, panels.progress_percent.is_some());
        if let Some(percent) = panels.progress_percent {
            let _ = self.bar.style().set_property("width", &format!("{percent}%"));
            self.percent_label.set_text_content(Some(&format!("{percent}%")));
        }

        show(&self.alert, panels.error.is_some());
        self.alert_text.set_text_content(panels.error.as_deref());

        show(&self.header, panels.controls);
        show(&self.footer, panels.controls);
    }
}

fn div(class: &str, style: &str) -> Result<HtmlDivElement> {
    let element = browser::create_element::<HtmlDivElement>("div")?;
    element.set_class_name(class);
    if !style.is_empty() {
        element.set_attribute("style", style).map_err(js_err)?;
    }
    Ok(element)
}

fn button(label: &str) -> Result<HtmlButtonElement> {
    let element = browser::create_element::<HtmlButtonElement>("button")?;
    element.set_type("button");
    element.set_text_content(Some(label));
    Ok(element)
}

fn append(parent: &HtmlElement, child: &HtmlElement) -> Result<()> {
    parent.append_child(child).map(|_| ()).map_err(js_err)
}

fn show(element: &HtmlElement, visible: bool) {
    element.set_hidden(!visible);
}

fn js_err(err: wasm_bindgen::JsValue) -> anyhow::Error {
    anyhow!("DOM error : {}", browser::js_error_message(&err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_shows_progress_only() {
        let mut state = EmbedState::default();
        state.set_progress(0.42);
        let panels = Panels::from(&state);
        assert_eq!(panels.progress_percent, Some(42));
        assert_eq!(panels.error, None);
        assert!(!panels.controls);
    }

    #[test]
    fn ready_shows_controls() {
        let mut state = EmbedState::default();
        state.ready();
        let panels = Panels::from(&state);
        assert_eq!(panels.progress_percent, None);
        assert!(panels.controls);
    }

    #[test]
    fn error_shows_alert_without_controls() {
        let mut state = EmbedState::default();
        state.fail("boom");
        let panels = Panels::from(&state);
        assert_eq!(panels.error.as_deref(), Some("boom"));
        assert_eq!(panels.progress_percent, None);
        assert!(!panels.controls);
    }
}
