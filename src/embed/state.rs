/// Coarse phase of a load attempt, derived from [`EmbedState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Errored,
}

/// Everything the view needs to draw the embed.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedState {
    pub loading: bool,
    /// Fraction in `[0, 1]` last reported by the runtime.
    pub progress: f64,
    pub error: Option<String>,
    pub has_instance: bool,
}

impl Default for EmbedState {
    fn default() -> Self {
        Self {
            loading: true,
            progress: 0.0,
            error: None,
            has_instance: false,
        }
    }
}

impl EmbedState {
    // Shown before the runtime reports anything so the bar is never empty.
    const MIN_DISPLAY_PERCENT: u32 = 1;

    pub fn load_state(&self) -> LoadState {
        if self.error.is_some() {
            LoadState::Errored
        } else if self.has_instance && !self.loading {
            LoadState::Ready
        } else {
            LoadState::Loading
        }
    }

    pub fn set_progress(&mut self, fraction: f64) -> f64 {
        self.progress = clamp_fraction(fraction);
        self.progress
    }

    /// Percentage for the progress bar: `round(progress * 100)`, at least 1.
    pub fn display_percent(&self) -> u32 {
        let percent = (self.progress * 100.0).round() as u32;
        percent.max(Self::MIN_DISPLAY_PERCENT)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn ready(&mut self) {
        self.loading = false;
        self.error = None;
        self.has_instance = true;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.has_instance = false;
        self.error = Some(message.into());
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }
}

fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}
