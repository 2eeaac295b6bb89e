//! Cut planning: keyframe lookup, smart-cut plans and transition clusters

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod keyframe;
pub mod smart_cut;
pub mod transitions;

pub use keyframe::KeyframeLocator;
pub use smart_cut::SmartCutPlanner;

/// How one part of a plan is realized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartMode {
    /// Decode and re-compress
    Reencode,
    /// Re-package without re-encoding
    Copy,
}

/// Role of a part inside a three-part plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartRole {
    Head,
    Body,
    Tail,
    Whole,
}

impl PartRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartRole::Head => "head",
            PartRole::Body => "body",
            PartRole::Tail => "tail",
            PartRole::Whole => "whole",
        }
    }
}

/// One source range to realize, in source seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPart {
    pub role: PartRole,
    pub mode: PartMode,
    pub start: f64,
    pub end: f64,
}

impl PlannedPart {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Re-encode the requested range in one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullReencodePlan {
    pub source: PathBuf,
    pub start: f64,
    pub end: f64,
}

/// Re-encoded head and tail around a stream-copied body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreePartPlan {
    pub source: PathBuf,
    pub start: f64,
    pub end: f64,
    /// Keyframe the body starts on
    pub keyframe: f64,
    pub head: Option<PlannedPart>,
    pub body: PlannedPart,
    pub tail: Option<PlannedPart>,
}

/// Realization plan for a single-source range.
///
/// Every plan knows the simpler plan to try next when it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CutPlan {
    FullReencode(FullReencodePlan),
    ThreePart(ThreePartPlan),
}

impl CutPlan {
    pub fn full_reencode(source: impl Into<PathBuf>, start: f64, end: f64) -> Self {
        CutPlan::FullReencode(FullReencodePlan {
            source: source.into(),
            start,
            end,
        })
    }

    pub fn source(&self) -> &PathBuf {
        match self {
            CutPlan::FullReencode(plan) => &plan.source,
            CutPlan::ThreePart(plan) => &plan.source,
        }
    }

    /// Requested range in source seconds
    pub fn range(&self) -> (f64, f64) {
        match self {
            CutPlan::FullReencode(plan) => (plan.start, plan.end),
            CutPlan::ThreePart(plan) => (plan.start, plan.end),
        }
    }

    pub fn duration(&self) -> f64 {
        let (start, end) = self.range();
        end - start
    }

    /// Parts in realization order
    pub fn parts(&self) -> Vec<PlannedPart> {
        match self {
            CutPlan::FullReencode(plan) => vec![PlannedPart {
                role: PartRole::Whole,
                mode: PartMode::Reencode,
                start: plan.start,
                end: plan.end,
            }],
            CutPlan::ThreePart(plan) => plan
                .head
                .iter()
                .chain(std::iter::once(&plan.body))
                .chain(plan.tail.iter())
                .cloned()
                .collect(),
        }
    }

    /// Seconds that go through the encoder
    pub fn reencoded_seconds(&self) -> f64 {
        self.parts()
            .iter()
            .filter(|part| part.mode == PartMode::Reencode)
            .map(PlannedPart::duration)
            .sum()
    }

    /// Next simpler plan after a failure, if any
    pub fn fallback(&self) -> Option<CutPlan> {
        match self {
            CutPlan::ThreePart(plan) => Some(CutPlan::full_reencode(plan.source.clone(), plan.start, plan.end)),
            CutPlan::FullReencode(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CutPlan::FullReencode(_) => "full re-encode",
            CutPlan::ThreePart(_) => "three-part",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_part() -> CutPlan {
        CutPlan::ThreePart(ThreePartPlan {
            source: "a.mp4".into(),
            start: 10.0,
            end: 100.0,
            keyframe: 12.0,
            head: Some(PlannedPart {
                role: PartRole::Head,
                mode: PartMode::Reencode,
                start: 10.0,
                end: 12.0,
            }),
            body: PlannedPart {
                role: PartRole::Body,
                mode: PartMode::Copy,
                start: 12.0,
                end: 95.0,
            },
            tail: Some(PlannedPart {
                role: PartRole::Tail,
                mode: PartMode::Reencode,
                start: 95.0,
                end: 100.0,
            }),
        })
    }

    #[test]
    fn test_parts_in_order() {
        let roles: Vec<PartRole> = three_part().parts().iter().map(|p| p.role).collect();
        assert_eq!(roles, vec![PartRole::Head, PartRole::Body, PartRole::Tail]);
    }

    #[test]
    fn test_reencoded_seconds() {
        assert_eq!(three_part().reencoded_seconds(), 7.0);
        assert_eq!(CutPlan::full_reencode("a.mp4", 0.0, 4.0).reencoded_seconds(), 4.0);
    }

    #[test]
    fn test_fallback_chain() {
        let fallback = three_part().fallback().unwrap();
        assert_eq!(fallback, CutPlan::full_reencode("a.mp4", 10.0, 100.0));
        assert!(fallback.fallback().is_none());
    }
}
