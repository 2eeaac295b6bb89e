// Unit tests for domain models

use super::*;
use crate::domain::errors::*;

#[test]
fn test_time_spec_parse_seconds() {
    let time = TimeSpec::parse("123.456").unwrap();
    assert_eq!(time.seconds, 123.456);
}

#[test]
fn test_time_spec_parse_mm_ss() {
    let time = TimeSpec::parse("01:30.5").unwrap();
    assert_eq!(time.seconds, 90.5);
}

#[test]
fn test_time_spec_parse_hh_mm_ss() {
    let time = TimeSpec::parse("01:02:03.5").unwrap();
    assert_eq!(time.seconds, 3723.5);
}

#[test]
fn test_time_spec_parse_invalid() {
    assert!(TimeSpec::parse("invalid").is_err());
    assert!(TimeSpec::parse("00:60").is_err());
    assert!(TimeSpec::parse("01:60:00").is_err());
    assert!(TimeSpec::parse("-10").is_err());
}

#[test]
fn test_time_spec_display() {
    assert_eq!(TimeSpec::from_seconds(3723.456).to_string(), "01:02:03.456");
    assert_eq!(TimeSpec::from_seconds(123.456).to_string(), "02:03.456");
}

#[test]
fn test_segment_requires_end_after_start() {
    assert!(Segment::new(0.0, 10.0, "a.mp4").is_ok());
    assert!(matches!(
        Segment::new(10.0, 10.0, "a.mp4"),
        Err(EditError::InvalidSegment(_))
    ));
    assert!(Segment::new(10.0, 5.0, "a.mp4").is_err());
    assert!(Segment::new(-1.0, 5.0, "a.mp4").is_err());
}

#[test]
fn test_timeline_from_source() {
    let timeline = Timeline::from_source("a.mp4", 100.0).unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline.total_duration(), 100.0);
    assert_eq!(timeline.primary_source(), Some(&SourceId::from("a.mp4")));
}

#[test]
fn test_timeline_sources_in_order() {
    let timeline = Timeline::from_segments(
        vec![
            Segment::new(0.0, 5.0, "b.mp4").unwrap(),
            Segment::new(0.0, 5.0, "a.mp4").unwrap(),
            Segment::new(10.0, 15.0, "b.mp4").unwrap(),
        ],
        Some(SourceId::from("a.mp4")),
    )
    .unwrap();
    assert_eq!(
        timeline.sources(),
        vec![SourceId::from("b.mp4"), SourceId::from("a.mp4")]
    );
}

#[test]
fn test_clipboard_duration() {
    let clipboard = Clipboard::new(
        Some(SourceId::from("a.mp4")),
        vec![
            Segment::new(5.0, 15.0, "a.mp4").unwrap(),
            Segment::new(20.0, 22.5, "a.mp4").unwrap(),
        ],
    );
    assert_eq!(clipboard.duration, 12.5);
}

#[test]
fn test_transition_kind_parse() {
    assert_eq!(TransitionKind::parse("fade-black").unwrap(), TransitionKind::FadeBlack);
    assert_eq!(TransitionKind::parse("BLUR").unwrap(), TransitionKind::Blur);
    assert!(TransitionKind::parse("spin").is_err());
}

#[test]
fn test_transition_effect_validation() {
    assert!(TransitionEffect::new(10.0, TransitionKind::Flash, 1.0, false).is_ok());
    assert!(TransitionEffect::new(10.0, TransitionKind::Flash, 0.0, false).is_err());
    assert!(TransitionEffect::new(-1.0, TransitionKind::Flash, 1.0, false).is_err());

    let effect = TransitionEffect::new(10.0, TransitionKind::Blur, 2.0, false).unwrap();
    assert_eq!(effect.effect_start(), 9.0);
    assert_eq!(effect.effect_end(), 11.0);
}

#[test]
fn test_transition_effect_serde_kebab_case() {
    let effect = TransitionEffect::new(3.0, TransitionKind::FadeWhite, 1.0, true).unwrap();
    let json = serde_json::to_string(&effect).unwrap();
    assert!(json.contains("\"fade-white\""));
    let back: TransitionEffect = serde_json::from_str(&json).unwrap();
    assert_eq!(back, effect);
}

#[test]
fn test_media_probe_helpers() {
    let probe = MediaProbe {
        path: "a.mp4".into(),
        duration: 12.0,
        streams: vec![
            StreamInfo {
                index: 0,
                kind: StreamKind::Video,
                codec: "h264".to_string(),
                width: Some(1920),
                height: Some(1080),
                sample_rate: None,
            },
            StreamInfo {
                index: 1,
                kind: StreamKind::Audio,
                codec: "aac".to_string(),
                width: None,
                height: None,
                sample_rate: Some(48000),
            },
        ],
    };
    assert_eq!(probe.video_codec(), Some("h264"));
    assert!(probe.has_audio());
}
