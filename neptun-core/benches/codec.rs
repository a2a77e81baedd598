//! Benchmarks for the frame codec and state decoder

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use neptun_core::{checksum, decode_state, frame, Command};

const STATE_BLOCK: &str = "0254415200684900054E343130364D001136303A43353A41383A36463A35363A36\
                           41410001005300070103000000000473000C0301D60003026400020364004C0004\
                           02000000430014000000000100000000010000000001000000000144000A313439\
                           32333836313033570001043F0E";

fn codec_benchmarks(c: &mut Criterion) {
    let block = hex::decode(STATE_BLOCK).unwrap();

    c.bench_function("crc16_ccitt 110 bytes", |b| {
        b.iter(|| checksum::crc16_ccitt(black_box(&block[..110])))
    });

    c.bench_function("decode frame", |b| b.iter(|| frame::decode(black_box(&block))));

    c.bench_function("decode state", |b| b.iter(|| decode_state(black_box(&block))));

    c.bench_function("encode control", |b| {
        let payload = [0x53, 0x00, 0x04, 0x01, 0x00, 0x00, 0x00];
        b.iter(|| frame::encode(Command::SetSystemState, black_box(&payload)))
    });
}

criterion_group!(benches, codec_benchmarks);
criterion_main!(benches);
