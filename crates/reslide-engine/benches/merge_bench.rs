// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the layout/OCR merge in the reslide-engine crate.
// The merge compares every OCR line against every layout region, so dense
// text slides are the interesting case.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use reslide_core::{BBox, ElementType};
use reslide_engine::extract::{MergeThresholds, RawElement, merge};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A page with `regions` layout blocks in two columns and `lines` OCR lines
/// spread over the left column, plus one picture on the right.
fn page(regions: usize, lines: usize) -> (Vec<RawElement>, Vec<RawElement>) {
    let mut layout = Vec::with_capacity(regions + 1);
    for i in 0..regions {
        let y = 40.0 + (i / 2) as f64 * 90.0;
        let x = if i % 2 == 0 { 60.0 } else { 980.0 };
        layout.push(RawElement::new(ElementType::Paragraph, BBox::new(x, y, x + 860.0, y + 80.0)));
    }
    layout.push(RawElement::new(ElementType::Image, BBox::new(1000.0, 600.0, 1860.0, 1040.0)));

    let ocr = (0..lines)
        .map(|i| {
            let y = 44.0 + i as f64 * 22.0;
            RawElement::new(ElementType::Text, BBox::new(64.0, y, 900.0, y + 18.0))
                .with_content(format!("line {i}"))
        })
        .collect();
    (layout, ocr)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// A typical slide: a handful of regions, a dozen lines.
fn bench_merge_slide(c: &mut Criterion) {
    let (layout, ocr) = page(6, 12);
    c.bench_function("merge 6 regions x 12 lines", |b| {
        b.iter(|| {
            merge(
                black_box(layout.clone()),
                black_box(ocr.clone()),
                MergeThresholds::default(),
            )
        })
    });
}

/// A dense document page.
fn bench_merge_dense(c: &mut Criterion) {
    let (layout, ocr) = page(40, 45);
    c.bench_function("merge 40 regions x 45 lines", |b| {
        b.iter(|| {
            merge(
                black_box(layout.clone()),
                black_box(ocr.clone()),
                MergeThresholds::default(),
            )
        })
    });
}

criterion_group!(benches, bench_merge_slide, bench_merge_dense);
criterion_main!(benches);
