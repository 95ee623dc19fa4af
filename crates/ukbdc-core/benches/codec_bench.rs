//! Criterion benchmarks for the layout codec and the packet chunker.
//!
//! Run with:
//! ```bash
//! cargo bench --package ukbdc-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ukbdc_core::protocol::{chunk_message, paginate};
use ukbdc_core::{Action, KeyDef, Layout};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// A 64-key, 4-layer layout where every upper layer inherits half its keys.
fn make_layout(no_keys: usize, no_layers: usize) -> Layout {
    let mut layout = Layout::new(no_keys, no_layers).expect("valid dimensions");
    for key in 0..no_keys {
        let press = Action::relative((key % 3) as i8).expect("in range");
        layout
            .set(0, key, KeyDef::new(key as u8, press, Action::none()))
            .expect("slot");
    }
    for layer in 1..no_layers {
        layout.set_parent(layer, Some((layer - 1) as u8)).expect("parent");
        for key in (0..no_keys).step_by(2) {
            layout.set(layer, key, KeyDef::inherited()).expect("slot");
        }
    }
    layout
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_layout_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout_encode");
    for (keys, layers) in [(64usize, 4usize), (128, 16), (255, 32)] {
        let layout = make_layout(keys, layers);
        group.bench_with_input(
            BenchmarkId::new("host", format!("{keys}x{layers}")),
            &layout,
            |b, l| b.iter(|| l.to_bytes(black_box(false))),
        );
        group.bench_with_input(
            BenchmarkId::new("device", format!("{keys}x{layers}")),
            &layout,
            |b, l| b.iter(|| l.to_bytes(black_box(true))),
        );
    }
    group.finish();
}

fn bench_layout_decode(c: &mut Criterion) {
    let bytes = make_layout(64, 4).to_bytes(false).expect("encode");
    c.bench_function("layout_decode/64x4", |b| {
        b.iter(|| Layout::from_bytes(black_box(&bytes)))
    });
}

fn bench_program_chunking(c: &mut Criterion) {
    let binary = make_layout(64, 4).to_bytes(true).expect("encode");
    c.bench_function("chunk_device_binary/64x4", |b| {
        b.iter(|| {
            let pages = paginate(black_box(&binary)).expect("fits");
            pages
                .iter()
                .map(|m| chunk_message(m, 64).expect("chunk").len())
                .sum::<usize>()
        })
    });
}

criterion_group!(
    benches,
    bench_layout_encode,
    bench_layout_decode,
    bench_program_chunking
);
criterion_main!(benches);
