//! Benchmarks for block decoding, the hot path of every fetch.
//!
//! Runs entirely on synthetic blocks, so no TDengine installation is
//! needed.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use taos_cursor::types::{decode_column, transpose_block, Field, Ty};

const ROWS: usize = 4096;

fn timestamp_field() -> Field {
    Field {
        name: "ts".to_string(),
        ty: Ty::Timestamp,
        bytes: 8,
    }
}

fn synthetic_timestamps() -> Vec<u8> {
    let mut data = Vec::with_capacity(ROWS * 8);
    for i in 0..ROWS as i64 {
        data.extend_from_slice(&(1_700_000_000_000 + i).to_le_bytes());
    }
    data
}

fn synthetic_varchar(field: &Field) -> Vec<u8> {
    let slot = field.bytes as usize + 2;
    let mut data = vec![0u8; ROWS * slot];
    for i in 0..ROWS {
        let payload = format!("sensor-{i:04}");
        let cell = &mut data[i * slot..(i + 1) * slot];
        cell[0..2].copy_from_slice(&(payload.len() as u16).to_le_bytes());
        cell[2..2 + payload.len()].copy_from_slice(payload.as_bytes());
    }
    data
}

fn bench_decode_fixed(c: &mut Criterion) {
    let field = timestamp_field();
    let data = synthetic_timestamps();
    c.bench_function("decode_timestamp_column_4k", |b| {
        b.iter(|| decode_column(black_box(&field), black_box(&data), ROWS).unwrap())
    });
}

fn bench_decode_varchar(c: &mut Criterion) {
    let field = Field {
        name: "s".to_string(),
        ty: Ty::VarChar,
        bytes: 16,
    };
    let data = synthetic_varchar(&field);
    c.bench_function("decode_varchar_column_4k", |b| {
        b.iter(|| decode_column(black_box(&field), black_box(&data), ROWS).unwrap())
    });
}

fn bench_transpose(c: &mut Criterion) {
    let ts_field = timestamp_field();
    let v_field = Field {
        name: "v".to_string(),
        ty: Ty::Timestamp,
        bytes: 8,
    };
    let data = synthetic_timestamps();
    let columns = vec![
        decode_column(&ts_field, &data, ROWS).unwrap(),
        decode_column(&v_field, &data, ROWS).unwrap(),
    ];
    c.bench_function("transpose_block_4k_x2", |b| {
        b.iter(|| transpose_block(black_box(&columns)))
    });
}

criterion_group!(
    benches,
    bench_decode_fixed,
    bench_decode_varchar,
    bench_transpose
);
criterion_main!(benches);
