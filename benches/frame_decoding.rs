//! Benchmarks for wire frame decoding
//!
//! Covers the hot path of the serial pipeline:
//! - CRC-8 over a maximum-length frame body
//! - Resynchronizing scan over clean and noisy streams
//! - Sensor interpretation of decoded frames

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use huskki::codec::{CrcPolicy, FrameParser, crc};
use huskki::test_utils::{frame, sensor_stream};
use huskki::{ClockSource, SensorTable};
use std::hint::black_box;

fn bench_crc(c: &mut Criterion) {
    let body: Vec<u8> = (0..72u8).collect();

    let mut group = c.benchmark_group("crc8");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("max_frame_body", |b| b.iter(|| crc::checksum(black_box(&body))));
    group.finish();
}

fn bench_parser(c: &mut Criterion) {
    let clean = sensor_stream(10_000, 0);
    let noisy = sensor_stream(10_000, 4);

    let mut group = c.benchmark_group("frame_parser");

    group.throughput(Throughput::Bytes(clean.len() as u64));
    group.bench_function("clean_stream", |b| {
        b.iter(|| {
            let mut parser = FrameParser::new(CrcPolicy::Drop);
            black_box(parser.parse_all(black_box(&clean)).len())
        })
    });

    group.throughput(Throughput::Bytes(noisy.len() as u64));
    group.bench_function("noisy_stream", |b| {
        b.iter(|| {
            let mut parser = FrameParser::new(CrcPolicy::Drop);
            black_box(parser.parse_all(black_box(&noisy)).len())
        })
    });

    group.finish();
}

fn bench_interpret(c: &mut Criterion) {
    let table = SensorTable::default();
    let rpm = frame(1_000, 0x0100, &[0x4E, 0x20]);
    let unknown = frame(1_000, 0x7777, &[0x01, 0x02]);

    let mut group = c.benchmark_group("interpret");
    group.bench_function("known_identifier", |b| {
        b.iter(|| black_box(table.interpret(black_box(&rpm), ClockSource::Device)))
    });
    group.bench_function("unknown_identifier", |b| {
        b.iter(|| black_box(table.interpret(black_box(&unknown), ClockSource::Device)))
    });
    group.finish();
}

criterion_group!(benches, bench_crc, bench_parser, bench_interpret);
criterion_main!(benches);
