// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the escbridge-document crate. Measures decoding a
// phone-camera-sized PNG and fitting it to an 80mm print head.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

use escbridge_core::SourceDocument;
use escbridge_document::{Rasterizer, RenderOptions};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Rasterize a 1200x1600 synthetic label (dark frame, light body) to 576 dots.
fn bench_image_rasterize(c: &mut Criterion) {
    let (width, height) = (1200u32, 1600u32);
    let mut img = GrayImage::from_pixel(width, height, Luma([30u8]));
    for y in 100..1500 {
        for x in 100..1100 {
            img.put_pixel(x, y, Luma([240u8]));
        }
    }
    let mut png = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .expect("encode bench image");
    let document = SourceDocument::image(png);
    let rasterizer = Rasterizer::default();
    let options = RenderOptions::with_width(576);

    c.bench_function("rasterize png (1200x1600 -> 576)", |b| {
        b.iter(|| {
            let grid = rasterizer
                .rasterize(black_box(&document), &options)
                .expect("rasterize");
            black_box(grid);
        });
    });
}

criterion_group!(benches, bench_image_rasterize);
criterion_main!(benches);
