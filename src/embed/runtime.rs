//! Capabilities the controller needs from its surroundings.
//!
//! The controller never touches `window` or the DOM directly; the browser
//! implementations live in [`super::dom`] and [`super::loader`].
use crate::config::RuntimeConfig;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use wasm_bindgen::JsValue;

pub type ProgressFn = Rc<dyn Fn(f64)>;

/// Value argument of Unity's `SendMessage`.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageValue {
    Text(String),
    Number(f64),
}

/// A live Unity instance.
#[async_trait(?Send)]
pub trait RuntimeInstance {
    fn send_message(&self, target: &str, method: &str, value: Option<&MessageValue>)
        -> Result<()>;
    fn set_fullscreen(&self, fullscreen: bool) -> Result<()>;
    async fn quit(&self) -> Result<()>;

    /// The underlying JS object, for host code that wants to call into it.
    fn js_handle(&self) -> JsValue {
        JsValue::UNDEFINED
    }
}

/// The loader script's `createUnityInstance`.
#[async_trait(?Send)]
pub trait RuntimeFactory {
    async fn create(
        &self,
        config: &RuntimeConfig,
        on_progress: ProgressFn,
    ) -> Result<Rc<dyn RuntimeInstance>>;
}

#[async_trait(?Send)]
pub trait ScriptLoader {
    /// Resolves once the script at `url` is in the document and its factory is
    /// callable. Injects the script only if it is not already present.
    async fn ensure_loaded(&self, url: &str) -> Result<Rc<dyn RuntimeFactory>>;

    /// Removes the script element for `url`, if any.
    fn remove(&self, url: &str) -> Result<()>;
}

/// The page around the canvas plus the event loop.
pub trait Host {
    fn supports_webgl(&self) -> bool;
    fn show_canvas(&self);
    fn hide_canvas(&self);
    fn focus_canvas(&self);
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
    fn sleep(&self, millis: u32) -> LocalBoxFuture<'static, ()>;
}

/// Calls `check` until it yields a value, sleeping between attempts.
///
/// There is no retry limit. Polling stops with `None` as soon as
/// `keep_going` returns false, e.g. because the script was removed or the
/// embed went away.
pub async fn poll_until<T, P, S, K>(mut check: P, sleep: S, keep_going: K) -> Option<T>
where
    P: FnMut() -> Option<T>,
    S: Fn() -> LocalBoxFuture<'static, ()>,
    K: Fn() -> bool,
{
    loop {
        if let Some(value) = check() {
            return Some(value);
        }
        if !keep_going() {
            return None;
        }
        sleep().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::FutureExt;
    use std::cell::Cell;

    #[test]
    fn poll_until_waits_for_value() {
        let attempts = Cell::new(0);
        let sleeps = Rc::new(Cell::new(0));
        let counter = sleeps.clone();
        let value = block_on(poll_until(
            || {
                attempts.set(attempts.get() + 1);
                (attempts.get() == 3).then_some("factory")
            },
            move || {
                counter.set(counter.get() + 1);
                async {}.boxed_local()
            },
            || true,
        ));
        assert_eq!(value, Some("factory"));
        assert_eq!(attempts.get(), 3);
        assert_eq!(sleeps.get(), 2);
    }

    #[test]
    fn poll_until_does_not_sleep_when_ready() {
        let value = block_on(poll_until(|| Some(7), || async {}.boxed_local(), || false));
        assert_eq!(value, Some(7));
    }

    #[test]
    fn poll_until_stops_once_cancelled() {
        let attempts = Cell::new(0);
        let sleeps = Rc::new(Cell::new(0));
        let counter = sleeps.clone();
        let value: Option<()> = block_on(poll_until(
            || {
                attempts.set(attempts.get() + 1);
                None
            },
            move || {
                counter.set(counter.get() + 1);
                async {}.boxed_local()
            },
            || attempts.get() < 4,
        ));
        assert_eq!(value, None);
        assert_eq!(attempts.get(), 4);
        assert_eq!(sleeps.get(), 3);
    }
}
