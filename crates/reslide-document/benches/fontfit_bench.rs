// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the font-size search in the reslide-document crate.
// The search runs once per text box, so a dense slide calls it dozens of times.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use reslide_document::{FitParams, TextMeasurer, fit_font_size};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// A short title in a wide box: the search accepts a size near the top.
fn bench_title_fit(c: &mut Criterion) {
    let measurer = TextMeasurer::Estimate;
    let params = FitParams::default();
    c.bench_function("fit_font_size title (estimate)", |b| {
        b.iter(|| {
            fit_font_size(
                &measurer,
                black_box("Quarterly results"),
                black_box(600.0),
                black_box(60.0),
                &params,
            )
        })
    });
}

/// A long paragraph in a narrow box: the search walks most of the range,
/// re-wrapping the paragraph at every candidate size.
fn bench_paragraph_fit(c: &mut Criterion) {
    let measurer = TextMeasurer::Estimate;
    let params = FitParams::default();
    let paragraph = "Revenue grew in every region while operating costs held flat. ".repeat(12);
    c.bench_function("fit_font_size paragraph (estimate)", |b| {
        b.iter(|| fit_font_size(&measurer, black_box(&paragraph), 240.0, 180.0, &params))
    });

    // Measures with a real font when the host has one of the usual system fonts.
    let discovered = TextMeasurer::discover(None);
    if discovered.is_exact() {
        c.bench_function("fit_font_size paragraph (glyph)", |b| {
            b.iter(|| fit_font_size(&discovered, black_box(&paragraph), 240.0, 180.0, &params))
        });
    }
}

criterion_group!(benches, bench_title_fit, bench_paragraph_fit);
criterion_main!(benches);
