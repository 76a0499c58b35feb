use super::runtime::{Host, MessageValue, ProgressFn, RuntimeInstance, ScriptLoader};
use super::state::{EmbedState, LoadState};
use crate::config::{EmbedConfig, RuntimeConfig};
use crate::error::EmbedError;
use anyhow::Result;
use futures::FutureExt;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Delay between tearing an instance down and loading the next one.
pub const RESTART_DELAY_MS: u32 = 100;

/// Unity object that receives the lifecycle notifications below.
pub const NOTIFY_TARGET: &str = "GameManager";
pub const NOTIFY_READY: &str = "OnWebGLReady";
pub const NOTIFY_FOCUS: &str = "OnCanvasFocus";
pub const NOTIFY_INTERACTION: &str = "OnUserInteraction";

const WEBGL_UNSUPPORTED: &str = "WebGL is not supported in this browser";

#[derive(Default, Clone)]
pub struct Callbacks {
    pub on_ready: Option<Rc<dyn Fn()>>,
    pub on_error: Option<Rc<dyn Fn(&str)>>,
    pub on_progress: Option<Rc<dyn Fn(f64)>>,
}

/// Bookkeeping that guards async continuations.
///
/// `epoch` changes on every restart and on unmount; a continuation only
/// touches state if the epoch it started under is still current.
#[derive(Debug, Default)]
struct Lifecycle {
    mounted: bool,
    initialized: bool,
    epoch: u64,
    in_flight: Option<u64>,
}

struct Inner {
    config: EmbedConfig,
    host: Rc<dyn Host>,
    loader: Rc<dyn ScriptLoader>,
    callbacks: Callbacks,
    lifecycle: RefCell<Lifecycle>,
    state: RefCell<EmbedState>,
    instance: RefCell<Option<Rc<dyn RuntimeInstance>>>,
    observer: RefCell<Option<Rc<dyn Fn(&EmbedState)>>>,
}

enum Outcome {
    Loaded(Rc<dyn RuntimeInstance>),
    Failed(EmbedError),
    Abandoned,
}

/// Owns one Unity instance on one canvas.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct EmbedController {
    inner: Rc<Inner>,
}

impl EmbedController {
    pub fn new(
        config: EmbedConfig,
        host: Rc<dyn Host>,
        loader: Rc<dyn ScriptLoader>,
        callbacks: Callbacks,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                config,
                host,
                loader,
                callbacks,
                lifecycle: RefCell::new(Lifecycle::default()),
                state: RefCell::new(EmbedState::default()),
                instance: RefCell::new(None),
                observer: RefCell::new(None),
            }),
        }
    }

    pub fn state(&self) -> EmbedState {
        self.inner.state.borrow().clone()
    }

    pub fn load_state(&self) -> LoadState {
        self.inner.state.borrow().load_state()
    }

    pub fn instance(&self) -> Option<Rc<dyn RuntimeInstance>> {
        self.inner.instance.borrow().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.lifecycle.borrow().mounted
    }

    /// Registers the view; it is called after every state change.
    pub fn subscribe(&self, observer: impl Fn(&EmbedState) + 'static) {
        *self.inner.observer.borrow_mut() = Some(Rc::new(observer));
    }

    // ==================== Lifecycle ====================

    /// Marks the controller mounted and starts the first load. Later calls
    /// do nothing.
    pub fn mount(&self) {
        {
            let mut lifecycle = self.inner.lifecycle.borrow_mut();
            if lifecycle.initialized {
                return;
            }
            lifecycle.mounted = true;
            lifecycle.initialized = true;
        }
        log::info!("mounting embed for {}", self.inner.config.product_name);
        let this = self.clone();
        self.inner
            .host
            .spawn(async move { this.initialize().await }.boxed_local());
    }

    /// Runs one load attempt to completion.
    ///
    /// Skipped when unmounted, when an instance is already live, or when an
    /// attempt for the current epoch is still running.
    pub async fn initialize(&self) {
        let epoch = {
            let mut lifecycle = self.inner.lifecycle.borrow_mut();
            if !lifecycle.mounted
                || lifecycle.in_flight == Some(lifecycle.epoch)
                || self.inner.instance.borrow().is_some()
            {
                return;
            }
            lifecycle.in_flight = Some(lifecycle.epoch);
            lifecycle.epoch
        };
        // a retry after a failure starts from an empty bar, not the old error
        let stale = *self.inner.state.borrow() != EmbedState::default();
        if stale {
            self.inner.state.borrow_mut().reset();
            self.notify();
        }

        match self.load(epoch).await {
            Outcome::Loaded(instance) if self.is_current(epoch) => self.on_loaded(epoch, instance),
            Outcome::Loaded(instance) => {
                log::info!("discarding instance from a superseded load");
                self.quit_in_background(instance);
            }
            Outcome::Failed(err) if self.is_current(epoch) => self.on_failed(epoch, err),
            Outcome::Failed(err) => log::debug!("ignoring failure of superseded load: {err}"),
            Outcome::Abandoned => {}
        }
    }

    async fn load(&self, epoch: u64) -> Outcome {
        let inner = &self.inner;
        if !inner.host.supports_webgl() {
            return Outcome::Failed(EmbedError::Unsupported(WEBGL_UNSUPPORTED.into()));
        }
        inner.host.hide_canvas();

        let runtime_config = RuntimeConfig::from(&inner.config);
        let factory = match inner.loader.ensure_loaded(&runtime_config.assets.loader_url).await {
            Ok(factory) => factory,
            Err(err) => return Outcome::Failed(EmbedError::ScriptLoad(format!("{err:#}"))),
        };
        if !self.is_current(epoch) {
            return Outcome::Abandoned;
        }

        let instance = match factory
            .create(&runtime_config, self.progress_callback(epoch))
            .await
        {
            Ok(instance) => instance,
            Err(err) => return Outcome::Failed(EmbedError::Instantiate(format!("{err:#}"))),
        };

        if self.is_current(epoch) {
            if let Err(err) = instance.send_message(NOTIFY_TARGET, NOTIFY_READY, None) {
                log::debug!("{NOTIFY_TARGET}.{NOTIFY_READY} not delivered: {err:#}");
            }
        }
        Outcome::Loaded(instance)
    }

    fn progress_callback(&self, epoch: u64) -> ProgressFn {
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        Rc::new(move |fraction: f64| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let this = EmbedController { inner };
            if !this.is_current(epoch) {
                return;
            }
            let progress = this.inner.state.borrow_mut().set_progress(fraction);
            this.notify();
            if let Some(on_progress) = this.inner.callbacks.on_progress.clone() {
                on_progress(progress);
            }
        })
    }

    fn on_loaded(&self, epoch: u64, instance: Rc<dyn RuntimeInstance>) {
        let host = &self.inner.host;
        host.show_canvas();
        host.focus_canvas();
        *self.inner.instance.borrow_mut() = Some(instance);
        self.finish_attempt(epoch);
        self.inner.state.borrow_mut().ready();
        log::info!("{} is ready", self.inner.config.product_name);
        self.notify();
        if let Some(on_ready) = self.inner.callbacks.on_ready.clone() {
            on_ready();
        }
    }

    fn on_failed(&self, epoch: u64, err: EmbedError) {
        self.inner.host.show_canvas();
        self.finish_attempt(epoch);
        let message = err.message();
        if err.is_recoverable() {
            log::warn!("embed failed to load, restart to retry: {message}");
        } else {
            log::error!("embed cannot run here: {message}");
        }
        self.inner.state.borrow_mut().fail(message.clone());
        self.notify();
        if let Some(on_error) = self.inner.callbacks.on_error.clone() {
            on_error(&message);
        }
    }

    /// Tears the current instance down and schedules a fresh load.
    pub fn restart(&self) {
        if !self.is_mounted() {
            return;
        }
        log::info!("restarting {}", self.inner.config.product_name);
        let previous = self.inner.instance.borrow_mut().take();
        if let Some(instance) = previous {
            self.quit_in_background(instance);
        }
        let epoch = {
            let mut lifecycle = self.inner.lifecycle.borrow_mut();
            lifecycle.epoch += 1;
            lifecycle.in_flight = None;
            lifecycle.epoch
        };
        self.inner.state.borrow_mut().reset();
        self.notify();
        self.inner.host.hide_canvas();

        let loader_url = self.inner.config.assets().loader_url;
        if let Err(err) = self.inner.loader.remove(&loader_url) {
            log::warn!("could not remove loader script {loader_url}: {err:#}");
        }

        let this = self.clone();
        let delay = self.inner.host.sleep(RESTART_DELAY_MS);
        self.inner.host.spawn(
            async move {
                delay.await;
                if this.is_current(epoch) {
                    this.initialize().await;
                }
            }
            .boxed_local(),
        );
    }

    /// Suppresses every pending continuation and quits the live instance.
    pub fn unmount(&self) {
        {
            let mut lifecycle = self.inner.lifecycle.borrow_mut();
            if !lifecycle.mounted {
                return;
            }
            lifecycle.mounted = false;
            lifecycle.epoch += 1;
            lifecycle.in_flight = None;
        }
        let previous = self.inner.instance.borrow_mut().take();
        if let Some(instance) = previous {
            self.quit_in_background(instance);
        }
        log::info!("unmounted embed for {}", self.inner.config.product_name);
    }

    // ==================== Host API ====================

    /// Forwards to Unity's `SendMessage`. No-op without an instance.
    pub fn send_message(
        &self,
        target: &str,
        method: &str,
        value: Option<&MessageValue>,
    ) -> Result<()> {
        match self.instance() {
            Some(instance) => instance.send_message(target, method, value),
            None => Ok(()),
        }
    }

    /// No-op without an instance.
    pub fn set_fullscreen(&self, fullscreen: bool) -> Result<()> {
        match self.instance() {
            Some(instance) => instance.set_fullscreen(fullscreen),
            None => Ok(()),
        }
    }

    pub fn dismiss_error(&self) {
        self.inner.state.borrow_mut().dismiss_error();
        self.notify();
    }

    /// Click, touch and key presses on the canvas land here.
    pub fn notify_interaction(&self) {
        let Some(instance) = self.instance() else {
            return;
        };
        self.inner.host.focus_canvas();
        for method in [NOTIFY_FOCUS, NOTIFY_INTERACTION] {
            if let Err(err) = instance.send_message(NOTIFY_TARGET, method, None) {
                log::debug!("{NOTIFY_TARGET}.{method} not delivered: {err:#}");
            }
        }
    }

    // ==================== Internals ====================

    fn is_current(&self, epoch: u64) -> bool {
        let lifecycle = self.inner.lifecycle.borrow();
        lifecycle.mounted && lifecycle.epoch == epoch
    }

    fn finish_attempt(&self, epoch: u64) {
        let mut lifecycle = self.inner.lifecycle.borrow_mut();
        if lifecycle.in_flight == Some(epoch) {
            lifecycle.in_flight = None;
        }
    }

    fn quit_in_background(&self, instance: Rc<dyn RuntimeInstance>) {
        self.inner.host.spawn(
            async move {
                if let Err(err) = instance.quit().await {
                    log::warn!("failed to quit Unity instance: {err:#}");
                }
            }
            .boxed_local(),
        );
    }

    fn notify(&self) {
        let observer = self.inner.observer.borrow().clone();
        if let Some(observer) = observer {
            let snapshot = self.state();
            observer(&snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::runtime::RuntimeFactory;
    use crate::embed::view::Panels;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use futures::channel::oneshot;
    use futures::executor::{LocalPool, LocalSpawner};
    use futures::future::LocalBoxFuture;
    use futures::task::LocalSpawnExt;
    use std::cell::Cell;
    use std::collections::VecDeque;

    // ==================== Fakes ====================

    struct FakeHost {
        spawner: LocalSpawner,
        webgl: bool,
        visible: Cell<bool>,
        focus_count: Cell<u32>,
    }

    impl Host for FakeHost {
        fn supports_webgl(&self) -> bool {
            self.webgl
        }
        fn show_canvas(&self) {
            self.visible.set(true);
        }
        fn hide_canvas(&self) {
            self.visible.set(false);
        }
        fn focus_canvas(&self) {
            self.focus_count.set(self.focus_count.get() + 1);
        }
        fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
            self.spawner.spawn_local(task).unwrap();
        }
        fn sleep(&self, _millis: u32) -> LocalBoxFuture<'static, ()> {
            async {}.boxed_local()
        }
    }

    struct FakeInstance {
        live: Rc<Cell<i32>>,
        messages: RefCell<Vec<String>>,
        fullscreen: Cell<bool>,
        reject_messages: bool,
    }

    #[async_trait(?Send)]
    impl RuntimeInstance for FakeInstance {
        fn send_message(
            &self,
            target: &str,
            method: &str,
            _value: Option<&MessageValue>,
        ) -> Result<()> {
            if self.reject_messages {
                return Err(anyhow!("SendMessage: object {target} not found"));
            }
            self.messages.borrow_mut().push(format!("{target}.{method}"));
            Ok(())
        }
        fn set_fullscreen(&self, fullscreen: bool) -> Result<()> {
            self.fullscreen.set(fullscreen);
            Ok(())
        }
        async fn quit(&self) -> Result<()> {
            self.live.set(self.live.get() - 1);
            Ok(())
        }
    }

    type Pending = oneshot::Sender<Result<Rc<dyn RuntimeInstance>>>;

    #[derive(Default)]
    struct FakeFactory {
        pending: RefCell<VecDeque<Pending>>,
        progress: RefCell<Option<ProgressFn>>,
        calls: Cell<u32>,
    }

    impl FakeFactory {
        fn resolve_next(&self, result: Result<Rc<dyn RuntimeInstance>>) {
            let sender = self.pending.borrow_mut().pop_front().expect("no pending create");
            let _ = sender.send(result);
        }
        fn report(&self, fraction: f64) {
            let progress = self.progress.borrow().clone().expect("no progress callback");
            progress(fraction);
        }
    }

    #[async_trait(?Send)]
    impl RuntimeFactory for FakeFactory {
        async fn create(
            &self,
            _config: &RuntimeConfig,
            on_progress: ProgressFn,
        ) -> Result<Rc<dyn RuntimeInstance>> {
            self.calls.set(self.calls.get() + 1);
            *self.progress.borrow_mut() = Some(on_progress);
            let (tx, rx) = oneshot::channel();
            self.pending.borrow_mut().push_back(tx);
            rx.await?
        }
    }

    struct SharedFactory(Rc<FakeFactory>);

    #[async_trait(?Send)]
    impl RuntimeFactory for SharedFactory {
        async fn create(
            &self,
            config: &RuntimeConfig,
            on_progress: ProgressFn,
        ) -> Result<Rc<dyn RuntimeInstance>> {
            self.0.create(config, on_progress).await
        }
    }

    #[derive(Default)]
    struct FakeLoader {
        factory: Rc<FakeFactory>,
        loaded: RefCell<Vec<String>>,
        removed: RefCell<Vec<String>>,
        fail_with: Option<String>,
    }

    #[async_trait(?Send)]
    impl ScriptLoader for FakeLoader {
        async fn ensure_loaded(&self, url: &str) -> Result<Rc<dyn RuntimeFactory>> {
            self.loaded.borrow_mut().push(url.to_string());
            if let Some(message) = &self.fail_with {
                return Err(anyhow!("{message}"));
            }
            Ok(Rc::new(SharedFactory(self.factory.clone())))
        }
        fn remove(&self, url: &str) -> Result<()> {
            self.removed.borrow_mut().push(url.to_string());
            Ok(())
        }
    }

    struct Fixture {
        pool: LocalPool,
        host: Rc<FakeHost>,
        loader: Rc<FakeLoader>,
        live: Rc<Cell<i32>>,
        controller: EmbedController,
        errors: Rc<RefCell<Vec<String>>>,
        ready_count: Rc<Cell<u32>>,
        progress_seen: Rc<RefCell<Vec<f64>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with(true, None)
        }

        fn with(webgl: bool, fail_with: Option<&str>) -> Self {
            let pool = LocalPool::new();
            let host = Rc::new(FakeHost {
                spawner: pool.spawner(),
                webgl,
                visible: Cell::new(true),
                focus_count: Cell::new(0),
            });
            let loader = Rc::new(FakeLoader {
                fail_with: fail_with.map(str::to_string),
                ..FakeLoader::default()
            });
            let errors = Rc::new(RefCell::new(Vec::new()));
            let ready_count = Rc::new(Cell::new(0));
            let progress_seen = Rc::new(RefCell::new(Vec::new()));
            let callbacks = Callbacks {
                on_ready: Some({
                    let ready_count = ready_count.clone();
                    Rc::new(move || ready_count.set(ready_count.get() + 1))
                }),
                on_error: Some({
                    let errors = errors.clone();
                    Rc::new(move |message: &str| errors.borrow_mut().push(message.to_string()))
                }),
                on_progress: Some({
                    let progress_seen = progress_seen.clone();
                    Rc::new(move |fraction: f64| progress_seen.borrow_mut().push(fraction))
                }),
            };
            let controller = EmbedController::new(
                EmbedConfig::default(),
                host.clone(),
                loader.clone(),
                callbacks,
            );
            Self {
                pool,
                host,
                loader,
                live: Rc::new(Cell::new(0)),
                controller,
                errors,
                ready_count,
                progress_seen,
            }
        }

        fn instance(&self) -> Rc<FakeInstance> {
            self.instance_with(false)
        }

        fn instance_with(&self, reject_messages: bool) -> Rc<FakeInstance> {
            self.live.set(self.live.get() + 1);
            Rc::new(FakeInstance {
                live: self.live.clone(),
                messages: RefCell::new(Vec::new()),
                fullscreen: Cell::new(false),
                reject_messages,
            })
        }

        fn factory(&self) -> &FakeFactory {
            &self.loader.factory
        }

        fn run(&mut self) {
            self.pool.run_until_stalled();
        }
    }

    // ==================== Tests ====================

    #[test]
    fn loads_script_then_becomes_ready() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();

        assert_eq!(*fx.loader.loaded.borrow(), vec!["/Build/UnityBuild.loader.js"]);
        assert_eq!(fx.factory().calls.get(), 1);
        assert!(!fx.host.visible.get(), "canvas hidden while loading");
        assert_eq!(fx.controller.load_state(), LoadState::Loading);

        let instance = fx.instance();
        fx.factory().resolve_next(Ok(instance.clone()));
        fx.run();

        let state = fx.controller.state();
        assert_eq!(fx.controller.load_state(), LoadState::Ready);
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert!(fx.host.visible.get());
        assert_eq!(fx.host.focus_count.get(), 1);
        assert_eq!(fx.ready_count.get(), 1);
        assert_eq!(*instance.messages.borrow(), vec!["GameManager.OnWebGLReady"]);
    }

    #[test]
    fn rejected_creation_surfaces_error() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();
        fx.factory().resolve_next(Err(anyhow!("boom")));
        fx.run();

        let state = fx.controller.state();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert!(fx.controller.instance().is_none());
        assert!(fx.host.visible.get());
        assert_eq!(*fx.errors.borrow(), vec!["boom"]);
    }

    #[test]
    fn initialize_after_failure_starts_a_fresh_attempt() {
        let mut fx = Fixture::new();
        let panels = Rc::new(RefCell::new(Vec::new()));
        {
            let panels = panels.clone();
            fx.controller
                .subscribe(move |state| panels.borrow_mut().push(Panels::from(state)));
        }
        fx.controller.mount();
        fx.run();
        fx.factory().report(0.8);
        fx.factory().resolve_next(Err(anyhow!("boom")));
        fx.run();
        assert_eq!(fx.controller.load_state(), LoadState::Errored);

        let controller = fx.controller.clone();
        fx.host.spawn(async move { controller.initialize().await }.boxed_local());
        fx.run();

        assert_eq!(fx.factory().calls.get(), 2);
        let state = fx.controller.state();
        assert!(state.loading);
        assert_eq!(state.error, None);
        assert_eq!(state.progress, 0.0);
        assert_eq!(fx.controller.load_state(), LoadState::Loading);
        let shown = panels.borrow().last().cloned().expect("view updated");
        assert_eq!(shown.progress_percent, Some(1));
        assert_eq!(shown.error, None);

        fx.factory().report(0.5);
        assert_eq!(Panels::from(&fx.controller.state()).progress_percent, Some(50));
        assert!(!fx.host.visible.get(), "canvas hidden while retrying");
    }

    #[test]
    fn script_failure_is_recoverable_by_restart() {
        let mut fx = Fixture::with(true, Some("Failed to load /Build/UnityBuild.loader.js"));
        fx.controller.mount();
        fx.run();
        assert_eq!(fx.controller.load_state(), LoadState::Errored);
        assert_eq!(fx.factory().calls.get(), 0);

        fx.controller.restart();
        assert_eq!(fx.controller.state(), EmbedState::default());
        fx.run();
        assert_eq!(fx.loader.loaded.borrow().len(), 2);
        assert_eq!(*fx.loader.removed.borrow(), vec!["/Build/UnityBuild.loader.js"]);
    }

    #[test]
    fn missing_webgl_skips_loading() {
        let mut fx = Fixture::with(false, None);
        fx.controller.mount();
        fx.run();

        let state = fx.controller.state();
        assert_eq!(state.error.as_deref(), Some(WEBGL_UNSUPPORTED));
        assert!(!state.loading);
        assert!(fx.loader.loaded.borrow().is_empty());
    }

    #[test]
    fn mount_initializes_once() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.controller.mount();
        fx.run();
        assert_eq!(fx.loader.loaded.borrow().len(), 1);
    }

    #[test]
    fn initialize_is_ignored_while_attempt_in_flight() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();
        let controller = fx.controller.clone();
        fx.host.spawn(async move { controller.initialize().await }.boxed_local());
        fx.run();
        assert_eq!(fx.factory().calls.get(), 1);
    }

    #[test]
    fn progress_updates_state_and_callback() {
        let mut fx = Fixture::new();
        let percents = Rc::new(RefCell::new(Vec::new()));
        {
            let percents = percents.clone();
            fx.controller
                .subscribe(move |state| percents.borrow_mut().push(state.display_percent()));
        }
        fx.controller.mount();
        fx.run();
        for fraction in [0.0, 0.004, 0.25, 0.25, 0.9, 1.0] {
            fx.factory().report(fraction);
        }
        assert_eq!(*fx.progress_seen.borrow(), vec![0.0, 0.004, 0.25, 0.25, 0.9, 1.0]);
        let percents = percents.borrow();
        assert!(percents.iter().all(|p| *p >= 1));
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(percents.last(), Some(&100));
    }

    #[test]
    fn restart_keeps_at_most_one_instance() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();
        fx.factory().resolve_next(Ok(fx.instance()));
        fx.run();
        assert_eq!(fx.live.get(), 1);

        fx.controller.restart();
        assert!(fx.controller.instance().is_none());
        assert!(!fx.host.visible.get());
        fx.run();
        assert_eq!(fx.live.get(), 0, "previous instance quit");
        assert_eq!(fx.factory().calls.get(), 2);

        fx.factory().resolve_next(Ok(fx.instance()));
        fx.run();
        assert_eq!(fx.live.get(), 1);
        assert_eq!(fx.controller.load_state(), LoadState::Ready);
    }

    #[test]
    fn restart_during_load_discards_the_stale_instance() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();

        fx.controller.restart();
        fx.run();
        assert_eq!(fx.factory().calls.get(), 2);

        let stale = fx.instance();
        fx.factory().resolve_next(Ok(stale.clone()));
        fx.run();
        assert!(fx.controller.instance().is_none());
        assert_eq!(fx.live.get(), 0, "stale instance quit");
        assert!(stale.messages.borrow().is_empty());

        let fresh = fx.instance();
        fx.factory().resolve_next(Ok(fresh));
        fx.run();
        assert_eq!(fx.live.get(), 1);
        assert_eq!(fx.ready_count.get(), 1);
    }

    #[test]
    fn stale_progress_is_ignored_after_restart() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();
        let stale_progress = fx.factory().progress.borrow().clone().unwrap();

        fx.controller.restart();
        fx.run();
        stale_progress(0.8);
        assert_eq!(fx.controller.state().progress, 0.0);
    }

    #[test]
    fn unmount_during_load_leaves_state_untouched() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();
        let before = fx.controller.state();

        fx.controller.unmount();
        fx.factory().report(0.5);
        fx.factory().resolve_next(Err(anyhow!("boom")));
        fx.run();

        assert_eq!(fx.controller.state(), before);
        assert!(fx.errors.borrow().is_empty());
        assert!(fx.progress_seen.borrow().is_empty());
    }

    #[test]
    fn unmount_during_load_quits_late_instance() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();
        fx.controller.unmount();

        fx.factory().resolve_next(Ok(fx.instance()));
        fx.run();
        assert!(fx.controller.instance().is_none());
        assert_eq!(fx.live.get(), 0);
        assert_eq!(fx.ready_count.get(), 0);
    }

    #[test]
    fn unmount_quits_live_instance_and_blocks_restart() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();
        fx.factory().resolve_next(Ok(fx.instance()));
        fx.run();

        fx.controller.unmount();
        fx.run();
        assert_eq!(fx.live.get(), 0);

        fx.controller.restart();
        fx.run();
        assert_eq!(fx.factory().calls.get(), 1);
    }

    #[test]
    fn host_api_is_noop_without_instance() {
        let fx = Fixture::new();
        assert!(fx.controller.send_message("Player", "Jump", None).is_ok());
        assert!(fx.controller.set_fullscreen(true).is_ok());
        fx.controller.notify_interaction();
        assert_eq!(fx.host.focus_count.get(), 0);
    }

    #[test]
    fn host_api_forwards_to_instance() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();
        let instance = fx.instance();
        fx.factory().resolve_next(Ok(instance.clone()));
        fx.run();

        fx.controller
            .send_message("Player", "SetSpeed", Some(&MessageValue::Number(2.5)))
            .unwrap();
        fx.controller.set_fullscreen(true).unwrap();
        assert!(instance.fullscreen.get());
        assert_eq!(instance.messages.borrow().last().unwrap(), "Player.SetSpeed");
    }

    #[test]
    fn interaction_sends_focus_and_interaction_notices() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();
        let instance = fx.instance();
        fx.factory().resolve_next(Ok(instance.clone()));
        fx.run();

        fx.controller.notify_interaction();
        assert_eq!(
            *instance.messages.borrow(),
            vec![
                "GameManager.OnWebGLReady",
                "GameManager.OnCanvasFocus",
                "GameManager.OnUserInteraction",
            ]
        );
        assert_eq!(fx.host.focus_count.get(), 2);
    }

    #[test]
    fn rejected_notifications_are_swallowed() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();
        fx.factory().resolve_next(Ok(fx.instance_with(true)));
        fx.run();

        assert_eq!(fx.controller.load_state(), LoadState::Ready);
        fx.controller.notify_interaction();
        assert_eq!(fx.controller.state().error, None);
    }

    #[test]
    fn dismissing_error_does_not_retry() {
        let mut fx = Fixture::new();
        fx.controller.mount();
        fx.run();
        fx.factory().resolve_next(Err(anyhow!("boom")));
        fx.run();

        fx.controller.dismiss_error();
        fx.run();
        assert_eq!(fx.controller.state().error, None);
        assert_eq!(fx.factory().calls.get(), 1);
    }
}
