use criterion::{criterion_group, criterion_main, Criterion};
use sable_text::{next_grapheme_boundary, Text};

fn fragmented_text() -> Text {
    let paragraph = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
                     Päivää, terve! 🇫🇮 Sed do eiusmod tempor incididunt.\n";
    let mut text = Text::new();
    for _ in 0..200 {
        let at = text.len();
        text.insert(at, paragraph).unwrap();
        text.snapshot();
    }
    // fragment the middle
    for i in 0..1_000 {
        text.insert(i * 7, "A").unwrap();
        text.snapshot();
    }
    text
}

fn bytes(c: &mut Criterion) {
    c.bench_function("bytes_next", |bench| {
        let text = fragmented_text();
        let iter = text.bytes();
        let mut i = iter;
        // Measures a single step, restarts after finishing
        bench.iter(move || {
            if i.next().is_none() {
                i = iter;
            }
        });
    });

    c.bench_function("bytes_prev", |bench| {
        let text = fragmented_text();
        let iter = text.bytes_at(text.len());
        let mut i = iter;
        bench.iter(move || {
            if i.prev().is_none() {
                i = iter;
            }
        });
    });
}

fn chars(c: &mut Criterion) {
    c.bench_function("chars_next", |bench| {
        let text = fragmented_text();
        let iter = text.chars();
        let mut i = iter;
        bench.iter(move || {
            if i.next().is_none() {
                i = iter;
            }
        });
    });

    c.bench_function("chars_prev", |bench| {
        let text = fragmented_text();
        let iter = text.chars_at(text.len());
        let mut i = iter;
        bench.iter(move || {
            if i.prev().is_none() {
                i = iter;
            }
        });
    });
}

fn graphemes(c: &mut Criterion) {
    c.bench_function("grapheme_boundary_next", |bench| {
        let text = fragmented_text();
        let mut pos = 0;

        bench.iter(|| {
            pos = next_grapheme_boundary(&text, pos).unwrap_or(0);
        });
    });
}

fn lines(c: &mut Criterion) {
    c.bench_function("lineno_by_pos", |bench| {
        let text = fragmented_text();
        let mut pos = 0;

        bench.iter(|| {
            let line = text.lineno_by_pos(pos);
            pos = (pos + 4099) % text.len();
            line
        });
    });
}

criterion_group!(benches, bytes, chars, graphemes, lines);
criterion_main!(benches);
