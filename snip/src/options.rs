//! Trim options.

use serde::{Deserialize, Serialize};
use snip_codecs::VideoEncoderConfig;
use snip_core::AbortSignal;
use snip_pipeline::ProgressCallback;

/// Whether URL fetches send stored credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialsMode {
    #[default]
    Omit,
    Include,
}

/// Options for one trim operation, built with the builder pattern.
///
/// `start`/`end` are seconds on the source timeline, end exclusive.
pub struct TrimOptions {
    pub start: f64,
    pub end: f64,
    pub mute: bool,
    /// Target video encode override; source-derived when absent.
    pub video: Option<VideoEncoderConfig>,
    pub credentials: CredentialsMode,
    /// Bearer token sent when `credentials` is `Include`.
    pub authorization: Option<String>,
    pub signal: AbortSignal,
    pub on_progress: Option<ProgressCallback>,
}

impl TrimOptions {
    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            mute: false,
            video: None,
            credentials: CredentialsMode::default(),
            authorization: None,
            signal: AbortSignal::never(),
            on_progress: None,
        }
    }

    /// Drop the audio track from the output.
    #[must_use]
    pub fn mute(mut self) -> Self {
        self.mute = true;
        self
    }

    #[must_use]
    pub fn video_config(mut self, config: VideoEncoderConfig) -> Self {
        self.video = Some(config);
        self
    }

    #[must_use]
    pub fn credentials(mut self, mode: CredentialsMode) -> Self {
        self.credentials = mode;
        self
    }

    #[must_use]
    pub fn authorization(mut self, token: impl Into<String>) -> Self {
        self.authorization = Some(token.into());
        self
    }

    /// Observe this signal at every suspension point; aborting it resolves
    /// the operation as stopped.
    #[must_use]
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = signal;
        self
    }

    /// Progress observer. Fractions are in `[0, 1]`, non-decreasing, with
    /// a final call of exactly `1.0`; never invoked after an error.
    #[must_use]
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}
