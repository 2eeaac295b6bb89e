//! Smart-cut planning
//!
//! Splits a single-source range into a re-encoded head, a stream-copied body
//! starting on a keyframe, and a re-encoded tail. At most `2 * margin`
//! seconds are ever re-encoded, whatever the range length.

use std::path::Path;

use tracing::{debug, info};

use crate::config::SmartCutSettings;
use crate::error::{CutlistError, CutlistResult};
use crate::planner::keyframe::KeyframeLocator;
use crate::planner::{CutPlan, PartMode, PartRole, PlannedPart, ThreePartPlan};

/// Decides how to realize a source range
#[derive(Clone)]
pub struct SmartCutPlanner {
    locator: KeyframeLocator,
    settings: SmartCutSettings,
}

impl SmartCutPlanner {
    pub fn new(locator: KeyframeLocator, settings: SmartCutSettings) -> Self {
        Self { locator, settings }
    }

    pub fn settings(&self) -> &SmartCutSettings {
        &self.settings
    }

    /// Plan `[start, end)` of `source` with the configured margin
    pub async fn plan(&self, source: &Path, start: f64, end: f64) -> CutlistResult<CutPlan> {
        self.plan_with_margin(source, start, end, self.settings.margin).await
    }

    /// Plan `[start, end)` of `source` with an explicit margin
    pub async fn plan_with_margin(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        margin: f64,
    ) -> CutlistResult<CutPlan> {
        validate_range(start, end, margin)?;

        if end - start < self.settings.min_split_duration {
            debug!(
                "Range {:.3}-{:.3} too short to split, re-encoding whole",
                start, end
            );
            return Ok(CutPlan::full_reencode(source, start, end));
        }

        let keyframe = self
            .locator
            .find_preceding_keyframe(source, start + margin)
            .await;
        let plan = plan_from_keyframe(source, start, end, margin, keyframe, &self.settings);

        info!(
            "Planned {} for {} [{:.3}, {:.3}), keyframe {:?}, {:.3}s re-encoded",
            plan.name(),
            source.display(),
            start,
            end,
            keyframe,
            plan.reencoded_seconds()
        );
        Ok(plan)
    }
}

fn validate_range(start: f64, end: f64, margin: f64) -> CutlistResult<()> {
    if !start.is_finite() || !end.is_finite() || start < 0.0 {
        return Err(CutlistError::planning(format!(
            "range bounds must be finite and non-negative ({}, {})",
            start, end
        )));
    }
    if start >= end {
        return Err(CutlistError::planning(format!(
            "start ({:.3}s) must be before end ({:.3}s)",
            start, end
        )));
    }
    if margin <= 0.0 || !margin.is_finite() {
        return Err(CutlistError::planning(format!("margin must be positive, got {}", margin)));
    }
    Ok(())
}

/// Build the plan once the keyframe lookup has answered.
///
/// Falls back to a single full re-encode when the range is too short, no
/// keyframe was found, the keyframe precedes `start`, or it sits too close to
/// the far boundary to leave a copy span.
pub fn plan_from_keyframe(
    source: &Path,
    start: f64,
    end: f64,
    margin: f64,
    keyframe: Option<f64>,
    settings: &SmartCutSettings,
) -> CutPlan {
    let full = || CutPlan::full_reencode(source, start, end);

    if end - start < settings.min_split_duration {
        return full();
    }
    let Some(keyframe) = keyframe else {
        return full();
    };
    let body_end = end - margin;
    if keyframe < start || keyframe >= body_end {
        return full();
    }

    let epsilon = settings.boundary_epsilon;
    let head = (keyframe - start > epsilon).then(|| PlannedPart {
        role: PartRole::Head,
        mode: PartMode::Reencode,
        start,
        end: keyframe,
    });
    let body = PlannedPart {
        role: PartRole::Body,
        mode: PartMode::Copy,
        start: keyframe,
        end: body_end,
    };
    let tail = (end - body_end > epsilon).then(|| PlannedPart {
        role: PartRole::Tail,
        mode: PartMode::Reencode,
        start: body_end,
        end,
    });

    CutPlan::ThreePart(ThreePartPlan {
        source: source.to_path_buf(),
        start,
        end,
        keyframe,
        head,
        body,
        tail,
    })
}
