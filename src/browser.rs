use anyhow::{anyhow, Result};
use futures::channel::oneshot::channel;
use futures::future::{FutureExt, LocalBoxFuture};
use js_sys::{Function, Reflect};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

#[rustfmt::skip]
use web_sys::{
    Document,
    Element,
    Event,
    EventTarget,
    HtmlCanvasElement,
    HtmlElement,
    Request,
    RequestInit,
    Response,
    Window,
};

// ==================== Constants ====================
mod html {
    pub const CANVAS: &str = "canvas";
    pub const WEBGL: &str = "webgl";
    pub const WEBGL2: &str = "webgl2";
}

// ==================== Window / Document ====================

pub fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| anyhow!("Window not found"))
}

pub fn document() -> Result<Document> {
    window()?
        .document()
        .ok_or_else(|| anyhow!("No Document Found"))
}

pub fn create_element<T: JsCast>(tag: &str) -> Result<T> {
    document()?
        .create_element(tag)
        .map_err(|err| anyhow!("Could not create <{}> : {:#?}", tag, err))?
        .dyn_into::<T>()
        .map_err(|element| anyhow!("Error converting {:#?} to requested element type", element))
}

pub fn get_element_by_id(id: &str) -> Result<HtmlElement> {
    document()?
        .get_element_by_id(id)
        .ok_or_else(|| anyhow!("No Element found with ID : '{}'", id))?
        .dyn_into::<HtmlElement>()
        .map_err(|element| anyhow!("Error converting {:#?} to HtmlElement", element))
}

pub fn query_selector(selector: &str) -> Result<Option<Element>> {
    document()?
        .query_selector(selector)
        .map_err(|err| anyhow!("Invalid selector '{}' : {:#?}", selector, err))
}

pub fn create_canvas() -> Result<HtmlCanvasElement> {
    create_element::<HtmlCanvasElement>(html::CANVAS)
}

pub fn user_agent() -> Result<String> {
    window()?
        .navigator()
        .user_agent()
        .map_err(|err| anyhow!("Could not read user agent : {:#?}", err))
}

/// Whether a throwaway canvas can hand out a WebGL context.
pub fn supports_webgl() -> bool {
    let Ok(canvas) = create_canvas() else {
        return false;
    };
    [html::WEBGL2, html::WEBGL]
        .iter()
        .any(|kind| matches!(canvas.get_context(kind), Ok(Some(_))))
}

pub fn local_storage_item(key: &str) -> Result<Option<String>> {
    let storage = window()?
        .local_storage()
        .map_err(|err| anyhow!("localStorage unavailable : {:#?}", err))?
        .ok_or_else(|| anyhow!("localStorage unavailable"))?;
    storage
        .get_item(key)
        .map_err(|err| anyhow!("Could not read localStorage['{}'] : {:#?}", key, err))
}

pub fn redirect(url: &str) -> Result<()> {
    window()?
        .location()
        .set_href(url)
        .map_err(|err| anyhow!("Could not navigate to {} : {:#?}", url, err))
}

// ==================== JS interop ====================

/// Looks up `window[name]` and returns it if it is callable.
pub fn global_function(name: &str) -> Option<Function> {
    let window = web_sys::window()?;
    Reflect::get(&window, &JsValue::from_str(name))
        .ok()?
        .dyn_into::<Function>()
        .ok()
}

pub fn js_method(target: &JsValue, name: &str) -> Result<Function> {
    Reflect::get(target, &JsValue::from_str(name))
        .map_err(|err| anyhow!("Could not read '{}' : {}", name, js_error_message(&err)))?
        .dyn_into::<Function>()
        .map_err(|_| anyhow!("'{}' is not a function", name))
}

/// Best human-readable text for a thrown/rejected JS value.
pub fn js_error_message(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Ok(message) = Reflect::get(value, &JsValue::from_str("message")) {
        if let Some(text) = message.as_string() {
            return text;
        }
    }
    format!("{:?}", value)
}

pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

/// Resolves after `millis` via `setTimeout`.
pub fn sleep(millis: u32) -> LocalBoxFuture<'static, ()> {
    let (tx, rx) = channel::<()>();
    // released by wasm-bindgen once the timer has fired
    let callback = Closure::<dyn FnMut()>::once_into_js(move || {
        let _ = tx.send(());
    });
    let scheduled = window().and_then(|window| {
        window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.unchecked_ref(),
                millis as i32,
            )
            .map_err(|err| anyhow!("setTimeout failed : {:#?}", err))
    });
    if let Err(err) = scheduled {
        log::warn!("{err:#}");
        return async {}.boxed_local();
    }
    async move {
        let _ = rx.await;
    }
    .boxed_local()
}

// ==================== Listeners ====================

/// An event listener that unregisters itself when dropped.
pub struct Listener {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    pub fn new<F>(target: &EventTarget, event: &'static str, handler: F) -> Result<Self>
    where
        F: FnMut(Event) + 'static,
    {
        let callback = Closure::<dyn FnMut(Event)>::new(handler);
        target
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .map_err(|err| anyhow!("Could not listen for '{}' : {:#?}", event, err))?;
        Ok(Self {
            target: target.clone(),
            event,
            callback,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(err) = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref())
        {
            log::warn!("could not remove '{}' listener : {:#?}", self.event, err);
        }
    }
}

// ==================== Fetch ====================

pub async fn fetch_json<T>(json_path: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let resp_value = fetch_with_str(json_path).await?;
    let resp: Response = resp_value
        .dyn_into()
        .map_err(|element| anyhow!("error converting [{:#?}] to Response", element))?;
    response_json(resp).await
}

/// Sends a `method` request to `url` with the given headers and decodes a
/// JSON body.
pub async fn fetch_json_with<T>(
    url: &str,
    method: &str,
    headers: &[(&str, &str)],
    body: Option<&impl Serialize>,
) -> Result<T>
where
    T: DeserializeOwned,
{
    let init = RequestInit::new();
    init.set_method(method);
    if let Some(body) = body {
        let text = serde_json::to_string(body)?;
        init.set_body(&JsValue::from_str(&text));
    }
    let request = Request::new_with_str_and_init(url, &init)
        .map_err(|err| anyhow!("could not build request for {} : {:#?}", url, err))?;
    let request_headers = request.headers();
    for (name, value) in headers {
        request_headers
            .set(name, value)
            .map_err(|err| anyhow!("invalid header {} : {:#?}", name, err))?;
    }

    let resp_value = JsFuture::from(window()?.fetch_with_request(&request))
        .await
        .map_err(|err| anyhow!("error fetching {} : {:#?}", url, err))?;
    let resp: Response = resp_value
        .dyn_into()
        .map_err(|element| anyhow!("error converting [{:#?}] to Response", element))?;
    if !resp.ok() {
        return Err(anyhow!("{} {} returned HTTP {}", method, url, resp.status()));
    }
    response_json(resp).await
}

async fn response_json<T>(resp: Response) -> Result<T>
where
    T: DeserializeOwned,
{
    let json = resp
        .json()
        .map_err(|err| anyhow!("Could not get JSON from response [{:#?}]", err))?;

    let json_value = JsFuture::from(json)
        .await
        .map_err(|err| anyhow!("error fetching [{:#?}]", err))?;

    serde_wasm_bindgen::from_value(json_value)
        .map_err(|err| anyhow!("error converting response : {:#?}", err))
}

async fn fetch_with_str(resource: &str) -> Result<JsValue> {
    let resp = window()?.fetch_with_str(resource);

    JsFuture::from(resp)
        .await
        .map_err(|err| anyhow!("error fetching : {:#?}", err))
}
