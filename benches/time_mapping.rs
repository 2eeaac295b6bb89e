//! Time mapping benchmarks.
//!
//! Lookups over fragmented timelines, the shape heavy editing produces.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cutlist::domain::edl::{remove_range, EdlStore};
use cutlist::domain::mapper::{source_to_timeline, source_to_timeline_nearest, timeline_to_source};
use cutlist::domain::model::{Segment, SourceId};

/// A one-hour source with a short gap cut every 10 seconds
fn fragmented(segment_count: usize) -> Vec<Segment> {
    (0..segment_count)
        .map(|i| {
            let start = i as f64 * 10.0;
            Segment::new(start, start + 9.0, "talk.mp4").unwrap()
        })
        .collect()
}

fn bench_timeline_to_source(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline_to_source");
    for count in [10, 100, 1000] {
        let segments = fragmented(count);
        let total = count as f64 * 9.0;
        group.bench_with_input(BenchmarkId::from_parameter(count), &segments, |b, segments| {
            b.iter(|| timeline_to_source(black_box(segments), black_box(total * 0.73)))
        });
    }
    group.finish();
}

fn bench_source_to_timeline(c: &mut Criterion) {
    let source = SourceId::from("talk.mp4");
    let mut group = c.benchmark_group("source_to_timeline");
    for count in [10, 100, 1000] {
        let segments = fragmented(count);
        let visible = count as f64 * 7.3 + 1.0;
        let hidden = (count / 2) as f64 * 10.0 + 9.5;
        group.bench_with_input(BenchmarkId::new("visible", count), &segments, |b, segments| {
            b.iter(|| source_to_timeline(black_box(segments), black_box(visible), &source))
        });
        group.bench_with_input(BenchmarkId::new("nearest", count), &segments, |b, segments| {
            b.iter(|| source_to_timeline_nearest(black_box(segments), black_box(hidden), &source))
        });
    }
    group.finish();
}

fn bench_edits(c: &mut Criterion) {
    let segments = fragmented(1000);
    c.bench_function("remove_range_1000", |b| {
        b.iter(|| remove_range(black_box(&segments), 4500.0, 4600.0, 0.1))
    });

    c.bench_function("delete_with_undo", |b| {
        b.iter(|| {
            let mut store = EdlStore::default();
            store.load_source("talk.mp4", 3600.0).unwrap();
            for i in 0..50 {
                let start = i as f64 * 30.0;
                store.delete_range(start, start + 5.0).unwrap();
            }
            while store.can_undo() {
                store.undo().unwrap();
            }
            black_box(store.total_duration())
        })
    });
}

criterion_group!(benches, bench_timeline_to_source, bench_source_to_timeline, bench_edits);
criterion_main!(benches);
