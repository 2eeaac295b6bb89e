//! Keyframe lookup around cut points
//!
//! Advisory only: every failure is reported as "no keyframe" so callers
//! fall back to a full re-encode.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::SmartCutSettings;
use crate::ports::{Encoder, TimeWindow};

/// Finds the nearest keyframe at or before a source time
#[derive(Clone)]
pub struct KeyframeLocator {
    encoder: Arc<dyn Encoder>,
    /// Half-width of the probe window (seconds)
    window: f64,
    timeout: Duration,
}

impl KeyframeLocator {
    pub fn new(encoder: Arc<dyn Encoder>, settings: &SmartCutSettings) -> Self {
        Self {
            encoder,
            window: settings.keyframe_window,
            timeout: Duration::from_secs(settings.keyframe_timeout_secs.max(1)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Greatest keyframe `<= target`, or `None` if the probe fails, times out
    /// or finds nothing
    pub async fn find_preceding_keyframe(&self, source: &Path, target: f64) -> Option<f64> {
        let window = TimeWindow::around(target, self.window);

        let keyframes = match tokio::time::timeout(self.timeout, self.encoder.find_keyframes(source, window)).await {
            Ok(Ok(keyframes)) => keyframes,
            Ok(Err(e)) => {
                warn!("Keyframe probe failed for {}: {}", source.display(), e);
                return None;
            }
            Err(_) => {
                warn!(
                    "Keyframe probe timed out after {:?} for {}",
                    self.timeout,
                    source.display()
                );
                return None;
            }
        };

        let found = preceding_keyframe(&keyframes, target);
        debug!(
            "{} keyframes in [{:.3}, {:.3}], preceding {:.3}: {:?}",
            keyframes.len(),
            window.start,
            window.end,
            target,
            found
        );
        found
    }
}

/// Greatest value `<= target` in an unsorted list
pub fn preceding_keyframe(keyframes: &[f64], target: f64) -> Option<f64> {
    keyframes
        .iter()
        .copied()
        .filter(|k| k.is_finite() && *k <= target)
        .fold(None, |best: Option<f64>, k| Some(best.map_or(k, |b| b.max(k))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preceding_keyframe() {
        let keyframes = [0.0, 2.0, 4.0, 6.0, 8.0];
        assert_eq!(preceding_keyframe(&keyframes, 5.0), Some(4.0));
        assert_eq!(preceding_keyframe(&keyframes, 6.0), Some(6.0));
        assert_eq!(preceding_keyframe(&keyframes, 100.0), Some(8.0));
        assert_eq!(preceding_keyframe(&[3.0, 1.0, 2.0], 2.5), Some(2.0));
    }

    #[test]
    fn test_preceding_keyframe_none() {
        assert_eq!(preceding_keyframe(&[], 5.0), None);
        assert_eq!(preceding_keyframe(&[6.0, 7.0], 5.0), None);
        assert_eq!(preceding_keyframe(&[f64::NAN], 5.0), None);
    }

    #[test]
    fn test_window_is_capped_at_zero() {
        let window = TimeWindow::around(5.0, 20.0);
        assert_eq!(window.start, 0.0);
        assert_eq!(window.end, 25.0);
    }
}
