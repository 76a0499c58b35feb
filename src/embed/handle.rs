use super::controller::{Callbacks, EmbedController};
use super::dom::{CanvasSizer, DomHost, ViewportMeta};
use super::layout::Sizing;
use super::loader::DomScriptLoader;
use super::runtime::MessageValue;
use super::view::EmbedView;
use crate::browser::{self, Listener};
use crate::config::EmbedConfig;
use anyhow::{anyhow, Result};
use js_sys::{Function, Reflect};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use web_sys::{Event, HtmlElement};

const INTERACTION_EVENTS: [&str; 3] = ["click", "touchstart", "keydown"];

/// A mounted embed, handed to host code.
///
/// Dropping the handle without calling [`EmbedHandle::unmount`] still
/// removes every listener and the viewport tag.
#[wasm_bindgen]
pub struct EmbedHandle {
    controller: EmbedController,
    view: Rc<EmbedView>,
    sizer: Rc<CanvasSizer>,
    listeners: RefCell<Vec<Listener>>,
    viewport: RefCell<Option<ViewportMeta>>,
}

impl EmbedHandle {
    /// Builds the embed inside `container` and starts loading.
    pub fn mount(
        container: &HtmlElement,
        config: EmbedConfig,
        callbacks: Callbacks,
    ) -> Result<Self> {
        let view = Rc::new(EmbedView::new(&config)?);
        container.append_child(&view.root).map_err(|err| {
            anyhow!("Could not attach embed : {}", browser::js_error_message(&err))
        })?;

        let host = Rc::new(DomHost::new(view.canvas.clone()));
        let loader = Rc::new(DomScriptLoader::new(view.canvas.clone()));
        let sizer = Rc::new(CanvasSizer::new(
            view.canvas.clone(),
            (*view.stage).clone(),
            Sizing::new(config.responsive, config.maintain_aspect_ratio),
            config.width,
            config.height,
        ));
        let controller = EmbedController::new(config, host, loader, callbacks);
        {
            let view = view.clone();
            controller.subscribe(move |state| view.render(state));
        }
        view.render(&controller.state());

        let viewport = browser::user_agent()
            .and_then(|agent| ViewportMeta::inject_if_needed(&agent));
        let viewport = match viewport {
            Ok(viewport) => viewport,
            Err(err) => {
                log::warn!("{err:#}");
                None
            }
        };

        let handle = Self {
            listeners: RefCell::new(Self::listen(&controller, &view, &sizer)?),
            controller,
            view,
            sizer,
            viewport: RefCell::new(viewport),
        };
        handle.sizer.apply();
        handle.controller.mount();
        Ok(handle)
    }

    fn listen(
        controller: &EmbedController,
        view: &EmbedView,
        sizer: &Rc<CanvasSizer>,
    ) -> Result<Vec<Listener>> {
        let mut listeners = Vec::new();

        if matches!(sizer.sizing(), Sizing::Responsive { .. }) {
            let sizer = sizer.clone();
            let window = browser::window()?;
            listeners.push(Listener::new(&window, "resize", move |_| sizer.apply())?);
        }

        for event in INTERACTION_EVENTS {
            let controller = controller.clone();
            listeners.push(Listener::new(&view.canvas, event, move |_| {
                controller.notify_interaction()
            })?);
        }

        let on_restart = controller.clone();
        listeners.push(Listener::new(&view.restart_button, "click", move |_| {
            on_restart.restart()
        })?);

        let on_fullscreen = controller.clone();
        listeners.push(Listener::new(&view.fullscreen_button, "click", move |_: Event| {
            if let Err(err) = on_fullscreen.set_fullscreen(true) {
                log::warn!("{err:#}");
            }
        })?);

        let on_dismiss = controller.clone();
        listeners.push(Listener::new(&view.dismiss_button, "click", move |_| {
            on_dismiss.dismiss_error()
        })?);

        Ok(listeners)
    }

    pub fn controller(&self) -> &EmbedController {
        &self.controller
    }
}

#[wasm_bindgen]
impl EmbedHandle {
    /// The Unity instance object, or `undefined` while none is live.
    pub fn instance(&self) -> JsValue {
        self.controller
            .instance()
            .map(|instance| instance.js_handle())
            .unwrap_or(JsValue::UNDEFINED)
    }

    #[wasm_bindgen(js_name = hasInstance)]
    pub fn has_instance(&self) -> bool {
        self.controller.instance().is_some()
    }

    pub fn initialize(&self) {
        let controller = self.controller.clone();
        browser::spawn_local(async move { controller.initialize().await });
    }

    pub fn restart(&self) {
        self.controller.restart();
    }

    #[wasm_bindgen(js_name = sendMessage)]
    pub fn send_message(&self, target: &str, method: &str, value: JsValue) -> Result<(), JsValue> {
        let value = if let Some(number) = value.as_f64() {
            Some(MessageValue::Number(number))
        } else {
            value.as_string().map(MessageValue::Text)
        };
        self.controller
            .send_message(target, method, value.as_ref())
            .map_err(|err| JsValue::from_str(&format!("{err:#}")))
    }

    #[wasm_bindgen(js_name = setFullscreen)]
    pub fn set_fullscreen(&self, fullscreen: bool) -> Result<(), JsValue> {
        self.controller
            .set_fullscreen(fullscreen)
            .map_err(|err| JsValue::from_str(&format!("{err:#}")))
    }

    #[wasm_bindgen(js_name = dismissError)]
    pub fn dismiss_error(&self) {
        self.controller.dismiss_error();
    }

    /// New fixed dimensions; ignored by responsive layouts except as the
    /// aspect ratio.
    #[wasm_bindgen(js_name = setDimensions)]
    pub fn set_dimensions(&self, width: u32, height: u32) {
        self.sizer.set_dimensions(width, height);
    }

    /// Current state as `{ loading, progress, error, hasInstance }`.
    pub fn state(&self) -> JsValue {
        let state = self.controller.state();
        let object = js_sys::Object::new();
        let fields = [
            ("loading", JsValue::from_bool(state.loading)),
            ("progress", JsValue::from_f64(state.progress)),
            (
                "error",
                state.error.map(|e| JsValue::from_str(&e)).unwrap_or(JsValue::NULL),
            ),
            ("hasInstance", JsValue::from_bool(state.has_instance)),
        ];
        for (key, value) in fields {
            let _ = Reflect::set(&object, &JsValue::from_str(key), &value);
        }
        object.into()
    }

    pub fn unmount(&self) {
        self.controller.unmount();
        self.listeners.borrow_mut().clear();
        self.viewport.borrow_mut().take();
        self.view.root.remove();
    }
}

impl Drop for EmbedHandle {
    fn drop(&mut self) {
        self.controller.unmount();
    }
}

/// Mounts an embed into the element with id `container_id`.
///
/// `config` follows [`EmbedConfig`] in camelCase; `callbacks` may carry
/// `onReady()`, `onError(message)` and `onProgress(fraction)`.
#[wasm_bindgen(js_name = mountEmbed)]
pub fn mount_embed(
    container_id: &str,
    config: JsValue,
    callbacks: JsValue,
) -> Result<EmbedHandle, JsValue> {
    let to_js = |err: anyhow::Error| JsValue::from_str(&format!("{err:#}"));
    let config: EmbedConfig = if config.is_undefined() || config.is_null() {
        EmbedConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config)
            .map_err(|err| JsValue::from_str(&err.to_string()))?
    };
    let container = browser::get_element_by_id(container_id).map_err(to_js)?;
    EmbedHandle::mount(&container, config, js_callbacks(&callbacks)).map_err(to_js)
}

fn js_callbacks(callbacks: &JsValue) -> Callbacks {
    let function = |name: &str| -> Option<Function> {
        if callbacks.is_object() {
            Reflect::get(callbacks, &JsValue::from_str(name))
                .ok()?
                .dyn_into::<Function>()
                .ok()
        } else {
            None
        }
    };
    Callbacks {
        on_ready: function("onReady").map(|f| -> Rc<dyn Fn()> {
            Rc::new(move || {
                let _ = f.call0(&JsValue::NULL);
            })
        }),
        on_error: function("onError").map(|f| -> Rc<dyn Fn(&str)> {
            Rc::new(move |message: &str| {
                let _ = f.call1(&JsValue::NULL, &JsValue::from_str(message));
            })
        }),
        on_progress: function("onProgress").map(|f| -> Rc<dyn Fn(f64)> {
            Rc::new(move |fraction: f64| {
                let _ = f.call1(&JsValue::NULL, &JsValue::from_f64(fraction));
            })
        }),
    }
}
