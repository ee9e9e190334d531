use std::fs;
use std::hint::black_box;
use std::io::BufWriter;

use byteorder::{LittleEndian, WriteBytesExt};
use criterion::{Criterion, criterion_group, criterion_main};
use reversi_eval::eval::{Eval, extract};

// Stored coefficients per map, file order.
const MAP_IDS: [usize; 17] = [
    6561, 6561, 6561, 6561, 6561, 2187, 729, 243, 29889, 6561, 59049, 29646, 64, 64, 64, 64, 2,
];

/// A coefficient tree filled with small deterministic values.
fn coefficient_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let coeff_dir = dir.path().join("coefficients");
    fs::create_dir(&coeff_dir).unwrap();
    for i in 0..6u8 {
        let path = coeff_dir.join(format!("J2{}.cof", (b'a' + i) as char));
        let mut w = BufWriter::new(fs::File::create(path).unwrap());
        w.write_i32::<LittleEndian>(1).unwrap();
        w.write_u32::<LittleEndian>(100).unwrap();
        for _subset in 0..2 {
            for (map, &n_ids) in MAP_IDS.iter().enumerate() {
                for id in 0..n_ids {
                    w.write_i16::<LittleEndian>(((map * 37 + id) % 401) as i16 - 200).unwrap();
                }
            }
        }
    }
    dir
}

// A midgame position: 30 discs, 34 empties.
const EMPTY: u64 = 0xFFC9_8381_8183_C3FF;
const MOVER: u64 = 0x0004_1C3C_1C08_0000;

fn bench_extract(c: &mut Criterion) {
    c.bench_function("eval_extract_patterns", |b| {
        b.iter(|| extract::extract(black_box(EMPTY), black_box(MOVER)))
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let dir = coefficient_dir();
    let eval = Eval::load('J', '2', dir.path()).unwrap();
    c.bench_function("eval_evaluate_midgame", |b| {
        b.iter(|| {
            eval.evaluate(
                black_box(EMPTY),
                black_box(MOVER),
                black_box(34),
                black_box(9),
                black_box(8),
            )
        })
    });
}

criterion_group!(benches, bench_extract, bench_evaluate);
criterion_main!(benches);
