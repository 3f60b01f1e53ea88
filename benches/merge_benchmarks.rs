use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use m3u_merge::ingestor::{parse_playlist, ParseOptions};
use m3u_merge::merge::{merge_documents, MergeInput, MergeOptions};

const CHANNELS: usize = 2_000;

/// Provider playlist where channel ids either repeat verbatim or only show up as display names
fn provider(offset: usize, ids_match: bool) -> String {
    let mut doc = String::from("#EXTM3U\n");
    for i in 0..CHANNELS {
        let id = if ids_match {
            format!("ch{i}")
        } else {
            format!("p{offset}-ch{i}")
        };
        doc.push_str(&format!(
            "#EXTINF:-1 tvg-id=\"{id}\" tvg-name=\"Channel {i}\" group-title=\"Group {}\",Channel {i} HD\n\
             http://p{offset}.example.com/live/{i}/index.m3u8\n",
            i % 20
        ));
    }
    doc
}

fn bench_parse(c: &mut Criterion) {
    let doc = provider(0, true);
    let options = ParseOptions::default();
    c.bench_function("parse_playlist", |b| {
        b.iter(|| black_box(parse_playlist(black_box(&doc), &options)))
    });
}

fn bench_merge(c: &mut Criterion) {
    let options = ParseOptions::default();
    let mut group = c.benchmark_group("merge_documents");
    for (label, ids_match) in [("exact_ids", true), ("alias_fallback", false)] {
        let inputs: Vec<_> = (0..4)
            .map(|offset| parse_playlist(&provider(offset, ids_match), &options))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(label), &inputs, |b, inputs| {
            b.iter(|| {
                let merged = merge_documents(
                    inputs.iter().cloned().map(MergeInput::Playlist),
                    MergeOptions::default(),
                );
                black_box(merged)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_merge);
criterion_main!(benches);
