use super::runtime::{
    poll_until, MessageValue, ProgressFn, RuntimeFactory, RuntimeInstance, ScriptLoader,
};
use crate::browser;
use crate::config::RuntimeConfig;
use anyhow::{anyhow, Error, Result};
use async_trait::async_trait;
use futures::channel::oneshot::channel;
use js_sys::{Function, Promise};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{HtmlCanvasElement, HtmlScriptElement};

/// Global the Unity loader script defines.
pub const FACTORY_GLOBAL: &str = "createUnityInstance";

const POLL_INTERVAL_MS: u32 = 100;

/// Loads Unity loader scripts into the current document.
pub struct DomScriptLoader {
    canvas: HtmlCanvasElement,
    // bumped by `remove` so pending waits for the old tag give up
    removals: Cell<u64>,
}

impl DomScriptLoader {
    pub fn new(canvas: HtmlCanvasElement) -> Self {
        Self {
            canvas,
            removals: Cell::new(0),
        }
    }

    async fn wait_for_factory(&self, url: &str) -> Result<Function> {
        let removals = self.removals.get();
        poll_until(
            || browser::global_function(FACTORY_GLOBAL),
            || browser::sleep(POLL_INTERVAL_MS),
            || self.removals.get() == removals && self.canvas.is_connected(),
        )
        .await
        .ok_or_else(|| anyhow!("stopped waiting for {FACTORY_GLOBAL} from {url}"))
    }
}

#[async_trait(?Send)]
impl ScriptLoader for DomScriptLoader {
    async fn ensure_loaded(&self, url: &str) -> Result<Rc<dyn RuntimeFactory>> {
        let function = match find_script(url)? {
            // someone already injected it; the factory shows up once it runs
            Some(_) => {
                log::debug!("{url} already present, waiting for {FACTORY_GLOBAL}");
                self.wait_for_factory(url).await?
            }
            None => {
                inject_script(url).await?;
                browser::global_function(FACTORY_GLOBAL)
                    .ok_or_else(|| anyhow!("{url} loaded but did not define {FACTORY_GLOBAL}"))?
            }
        };
        Ok(Rc::new(UnityFactory {
            function,
            canvas: self.canvas.clone(),
        }))
    }

    fn remove(&self, url: &str) -> Result<()> {
        self.removals.set(self.removals.get() + 1);
        if let Some(script) = find_script(url)? {
            script.remove();
        }
        Ok(())
    }
}

fn find_script(url: &str) -> Result<Option<web_sys::Element>> {
    browser::query_selector(&format!("script[src=\"{url}\"]"))
}

/// Appends a `<script>` for `url` and waits for its `load` or `error` event.
async fn inject_script(url: &str) -> Result<()> {
    let script = browser::create_element::<HtmlScriptElement>("script")?;
    let (tx, rx) = channel::<Result<(), Error>>();
    let success_tx = Rc::new(RefCell::new(Some(tx)));
    let error_tx = success_tx.clone();

    let success_callback = Closure::<dyn FnMut()>::once(move || {
        if let Some(tx) = success_tx.borrow_mut().take() {
            let _ = tx.send(Ok(()));
        }
    });

    let failed_url = url.to_string();
    let error_callback = Closure::<dyn FnMut(JsValue)>::once(move |_err: JsValue| {
        if let Some(tx) = error_tx.borrow_mut().take() {
            let _ = tx.send(Err(anyhow!("Failed to load Unity loader script: {failed_url}")));
        }
    });

    script.set_onload(Some(success_callback.as_ref().unchecked_ref()));
    script.set_onerror(Some(error_callback.as_ref().unchecked_ref()));
    script.set_async(true);
    script.set_src(url);

    browser::document()?
        .body()
        .ok_or_else(|| anyhow!("No body to attach {url} to"))?
        .append_child(&script)
        .map_err(|err| anyhow!("Could not append script {url} : {:#?}", err))?;

    let outcome = rx.await;
    // only one of the two fires; detach both before the closures drop
    script.set_onload(None);
    script.set_onerror(None);
    drop((success_callback, error_callback));

    outcome??;
    log::info!("loaded {url}");
    Ok(())
}

/// `createUnityInstance` bound to the canvas it renders into.
struct UnityFactory {
    function: Function,
    canvas: HtmlCanvasElement,
}

#[async_trait(?Send)]
impl RuntimeFactory for UnityFactory {
    async fn create(
        &self,
        config: &RuntimeConfig,
        on_progress: ProgressFn,
    ) -> Result<Rc<dyn RuntimeInstance>> {
        // plain objects, not Maps, for the flattened asset urls
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        let config_value = config
            .serialize(&serializer)
            .map_err(|err| anyhow!("Could not encode Unity config : {err}"))?;
        let progress = Closure::<dyn FnMut(f64)>::new(move |fraction: f64| on_progress(fraction));

        let promise = self
            .function
            .call3(
                &JsValue::NULL,
                &self.canvas,
                &config_value,
                progress.as_ref().unchecked_ref(),
            )
            .map_err(|err| anyhow!("{}", browser::js_error_message(&err)))?;
        let handle = JsFuture::from(Promise::from(promise))
            .await
            .map_err(|err| anyhow!("{}", browser::js_error_message(&err)))?;

        Ok(Rc::new(UnityInstance {
            handle,
            _progress: progress,
        }))
    }
}

/// The object `createUnityInstance` resolves to.
pub struct UnityInstance {
    handle: JsValue,
    // Unity may still report progress while the instance lives
    _progress: Closure<dyn FnMut(f64)>,
}

#[async_trait(?Send)]
impl RuntimeInstance for UnityInstance {
    fn send_message(
        &self,
        target: &str,
        method: &str,
        value: Option<&MessageValue>,
    ) -> Result<()> {
        let send = browser::js_method(&self.handle, "SendMessage")?;
        let target_value = JsValue::from_str(target);
        let method_value = JsValue::from_str(method);
        let result = match value {
            None => send.call2(&self.handle, &target_value, &method_value),
            Some(MessageValue::Text(text)) => send.call3(
                &self.handle,
                &target_value,
                &method_value,
                &JsValue::from_str(text),
            ),
            Some(MessageValue::Number(number)) => send.call3(
                &self.handle,
                &target_value,
                &method_value,
                &JsValue::from_f64(*number),
            ),
        };
        result.map(|_| ()).map_err(|err| {
            anyhow!(
                "SendMessage({target}, {method}) failed : {}",
                browser::js_error_message(&err)
            )
        })
    }

    fn set_fullscreen(&self, fullscreen: bool) -> Result<()> {
        let flag = JsValue::from_f64(if fullscreen { 1.0 } else { 0.0 });
        browser::js_method(&self.handle, "SetFullscreen")?
            .call1(&self.handle, &flag)
            .map(|_| ())
            .map_err(|err| anyhow!("SetFullscreen failed : {}", browser::js_error_message(&err)))
    }

    async fn quit(&self) -> Result<()> {
        let promise = browser::js_method(&self.handle, "Quit")?
            .call0(&self.handle)
            .map_err(|err| anyhow!("Quit failed : {}", browser::js_error_message(&err)))?;
        JsFuture::from(Promise::from(promise))
            .await
            .map_err(|err| anyhow!("Quit failed : {}", browser::js_error_message(&err)))?;
        Ok(())
    }

    fn js_handle(&self) -> JsValue {
        self.handle.clone()
    }
}
