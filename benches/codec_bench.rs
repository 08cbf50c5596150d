//! avclite 性能基准测试.
//!
//! 覆盖 CAVLC 熵编码, 4x4 变换与整帧编解码.

use std::hint::black_box;

use avclite::codec::cavlc::{decode_block, encode_to_bytes};
use avclite::codec::transform::{forward_4x4, inverse_4x4};
use avclite::codec::{DecoderSession, EncoderConfig, EncoderSession};
use avclite::core::{BitReader, Picture};
use criterion::{Criterion, criterion_group, criterion_main};

/// 创建带渐变纹理的测试图像
fn make_picture(width: usize, height: usize, shift: usize) -> Picture {
    let mut pic = Picture::new(width, height).unwrap();
    for y in 0..height {
        for x in 0..width {
            pic.luma.set(x, y, ((x * 3 + y * 2 + shift) % 220 + 16) as u8);
        }
    }
    pic
}

fn bench_cavlc(c: &mut Criterion) {
    let scan = [7, -3, 0, 2, 1, 0, 0, -1, 1, 0, 0, 0, 1, 0, 0, 0];
    let (bytes, _) = encode_to_bytes(2, &scan).unwrap();

    c.bench_function("cavlc_encode_4x4", |b| {
        b.iter(|| encode_to_bytes(black_box(2), black_box(&scan)).unwrap());
    });
    c.bench_function("cavlc_decode_4x4", |b| {
        b.iter(|| {
            let mut br = BitReader::new(black_box(&bytes));
            decode_block(&mut br, 2, 16).unwrap()
        });
    });
}

fn bench_transform(c: &mut Criterion) {
    let residual = [[5, -3, 2, 0], [-7, 12, 1, 4], [3, 0, -2, 6], [1, 8, -4, 2]];
    c.bench_function("forward_inverse_4x4_qp26", |b| {
        b.iter(|| {
            let levels = forward_4x4(black_box(&residual), 26);
            inverse_4x4(&levels, 26)
        });
    });
}

fn bench_frame(c: &mut Criterion) {
    let first = make_picture(176, 144, 0);
    let second = make_picture(176, 144, 5);

    c.bench_function("encode_qcif_ip", |b| {
        b.iter(|| {
            let mut enc = EncoderSession::new(EncoderConfig::default()).unwrap();
            enc.encode_picture(black_box(&first)).unwrap();
            enc.encode_picture(black_box(&second)).unwrap()
        });
    });

    let mut enc = EncoderSession::new(EncoderConfig::default()).unwrap();
    let mut stream = enc.encode_picture(&first).unwrap().data.to_vec();
    stream.extend_from_slice(&enc.encode_picture(&second).unwrap().data);
    c.bench_function("decode_qcif_ip", |b| {
        b.iter(|| {
            let mut dec = DecoderSession::default();
            dec.decode_annex_b(black_box(&stream)).unwrap()
        });
    });
}

criterion_group!(benches, bench_cavlc, bench_transform, bench_frame);
criterion_main!(benches);
