//! Performance benchmarks for envelope sealing and verification.
//!
//! ## Running the benchmarks
//!
//! ```bash
//! cargo bench -p meshnet-packet
//! ```
//!
//! ## Benchmarks included
//!
//! - `envelope_finalize_N` - Time to build and seal an envelope with an N-byte payload
//! - `envelope_verify_N` - Time to verify an envelope with an N-byte payload

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use meshnet_packet::{AuthKey, Envelope, MessageType, PAYLOAD_LEN};

const PAYLOAD_SIZES: [usize; 4] = [0, 4, 16, PAYLOAD_LEN];

fn bench_finalize(c: &mut Criterion) {
    let key = AuthKey::new([0x5a; 16]);
    let payload = [0xa5u8; PAYLOAD_LEN];
    let mut group = c.benchmark_group("envelope_finalize");

    for size in PAYLOAD_SIZES.iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut env = Envelope::new();
            b.iter(|| {
                env.init(42, 1);
                env.set_bytes(&payload[..size]).expect("payload fits");
                black_box(env.finalize(&key, 1, 0, MessageType::Reading))
            });
        });
    }

    group.finish();
}

fn bench_verify(c: &mut Criterion) {
    let key = AuthKey::new([0x5a; 16]);
    let payload = [0xa5u8; PAYLOAD_LEN];
    let mut group = c.benchmark_group("envelope_verify");

    for size in PAYLOAD_SIZES.iter() {
        let mut sealed = Envelope::new();
        sealed.init(42, 1);
        sealed.set_bytes(&payload[..*size]).expect("payload fits");
        let len = sealed.finalize(&key, 1, 0, MessageType::Reading);
        let wire = sealed.as_bytes().to_vec();

        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &wire, |b, wire| {
            let mut env = Envelope::new();
            b.iter(|| {
                env.reset();
                env.buffer_mut()[..wire.len()].copy_from_slice(wire);
                black_box(env.verify(&key, 1, 0, MessageType::Reading, wire.len()).is_ok())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_finalize, bench_verify);
criterion_main!(benches);
