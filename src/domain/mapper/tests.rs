// Unit tests for time mapping

use super::*;
use crate::domain::model::Segment;

const EPS: f64 = 1e-9;

fn seg(start: f64, end: f64, source: &str) -> Segment {
    Segment::new(start, end, source).unwrap()
}

fn trimmed_timeline() -> Vec<Segment> {
    // 100s source with [10, 20) deleted, then a 5s clip of b.mp4 appended
    vec![seg(0.0, 10.0, "a.mp4"), seg(20.0, 100.0, "a.mp4"), seg(3.0, 8.0, "b.mp4")]
}

#[test]
fn test_timeline_to_source_inside_segments() {
    let segments = trimmed_timeline();

    let pos = timeline_to_source(&segments, 5.0).unwrap();
    assert_eq!(pos.source, SourceId::from("a.mp4"));
    assert!((pos.time - 5.0).abs() < EPS);
    assert_eq!(pos.segment_index, 0);

    let pos = timeline_to_source(&segments, 10.0).unwrap();
    assert!((pos.time - 20.0).abs() < EPS);
    assert_eq!(pos.segment_index, 1);

    let pos = timeline_to_source(&segments, 91.0).unwrap();
    assert_eq!(pos.source, SourceId::from("b.mp4"));
    assert!((pos.time - 4.0).abs() < EPS);
}

#[test]
fn test_timeline_to_source_past_end_returns_last_end() {
    let segments = trimmed_timeline();
    let pos = timeline_to_source(&segments, 500.0).unwrap();
    assert_eq!(pos.source, SourceId::from("b.mp4"));
    assert_eq!(pos.time, 8.0);
    assert_eq!(pos.segment_index, 2);
}

#[test]
fn test_timeline_to_source_empty() {
    assert!(timeline_to_source(&[], 1.0).is_none());
}

#[test]
fn test_source_to_timeline_hidden_point_is_not_visible() {
    let segments = trimmed_timeline();
    assert!(source_to_timeline(&segments, 15.0, &SourceId::from("a.mp4")).is_none());
    assert!(source_to_timeline(&segments, 1.0, &SourceId::from("b.mp4")).is_none());
    assert!(source_to_timeline(&segments, 5.0, &SourceId::from("c.mp4")).is_none());
}

#[test]
fn test_round_trip_for_visible_points() {
    let segments = trimmed_timeline();
    let a = SourceId::from("a.mp4");
    let b = SourceId::from("b.mp4");

    let mut s = 0.0;
    while s <= 100.0 {
        if let Some(t) = source_to_timeline(&segments, s, &a) {
            let back = timeline_to_source(&segments, t).unwrap();
            assert!((back.time - s).abs() < 1e-6, "source {} -> {} -> {}", s, t, back.time);
        }
        s += 0.25;
    }

    let t = source_to_timeline(&segments, 6.5, &b).unwrap();
    assert!((t - 93.5).abs() < EPS);
    assert!((timeline_to_source(&segments, t).unwrap().time - 6.5).abs() < EPS);
}

#[test]
fn test_duplicated_range_maps_to_first_occurrence() {
    let segments = vec![seg(0.0, 10.0, "a.mp4"), seg(0.0, 10.0, "a.mp4")];
    let t = source_to_timeline(&segments, 4.0, &SourceId::from("a.mp4")).unwrap();
    assert_eq!(t, 4.0);
}

#[test]
fn test_nearest_mapping_snaps_hidden_points_to_boundaries() {
    let segments = trimmed_timeline();
    let a = SourceId::from("a.mp4");

    // 12 is closer to the end of [0, 10) than the start of [20, 100)
    assert_eq!(source_to_timeline_nearest(&segments, 12.0, &a), 10.0);
    // 18 snaps to the start of [20, 100), which also sits at timeline 10
    assert_eq!(source_to_timeline_nearest(&segments, 18.0, &a), 10.0);
    // Visible points are unchanged
    assert_eq!(source_to_timeline_nearest(&segments, 30.0, &a), 20.0);
    // Unknown source
    assert_eq!(source_to_timeline_nearest(&segments, 1.0, &SourceId::from("x")), 0.0);
}

#[test]
fn test_segment_at_and_offsets() {
    let segments = trimmed_timeline();
    assert_eq!(segment_at(&segments, 0.0), Some((0, 0.0)));
    assert_eq!(segment_at(&segments, 12.0), Some((1, 10.0)));
    assert_eq!(segment_at(&segments, 1000.0), Some((2, 90.0)));
    assert_eq!(segment_offsets(&segments), vec![0.0, 10.0, 90.0]);
    assert_eq!(total_duration(&segments), 95.0);
}
