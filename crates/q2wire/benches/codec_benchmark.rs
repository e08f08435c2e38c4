//! # Codec Benchmark
//!
//! REQUIREMENTS:
//! - A full 256-entity frame delta-compiles and writes well under a tick
//! - No allocations when writing into a reused packet
//!
//! Run with: `cargo bench --package q2wire`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use q2wire::messages::{print_level, SimpleMessage};
use q2wire::{
    parse_connect, CodecConfig, Lz4Block, PackedEntityState, PacketWriter, ServerContext,
};

/// Entities per frame.
const FRAME_ENTITIES: u16 = 256;

fn r1q2_context() -> ServerContext {
    let config = CodecConfig::default();
    let info = config.server_info();
    let connect = parse_connect(
        "35 1 2 \\name\\bench 1390 1905",
        &config.accepted_protocols(),
        info.default_packet_length,
    )
    .unwrap();
    ServerContext::new(info, &connect).unwrap()
}

fn frame(tick: u16) -> Vec<PackedEntityState> {
    let flavor = q2wire::PackingFlavor::Vanilla;
    (0..FRAME_ENTITIES)
        .map(|i| {
            let x = f32::from(i) * 16.0 + f32::from(tick);
            PackedEntityState {
                modelindex: [1 + (i % 40), 0, 0, 0],
                frame: tick % 40,
                origin: flavor.pack_coords([x, -x * 0.5, 24.0]),
                angles: flavor.pack_angles([0.0, f32::from(tick) * 3.0, 0.0]),
                ..PackedEntityState::default()
            }
        })
        .collect()
}

/// Benchmark: compile the deltas of one frame.
fn bench_entity_deltas(c: &mut Criterion) {
    let context = r1q2_context();
    let old = frame(0);
    let new = frame(1);

    c.bench_function("entity_deltas_256", |b| {
        b.iter(|| {
            for (from, to) in old.iter().zip(&new) {
                black_box(context.make_entity_delta(Some(from), to, false));
            }
        });
    });
}

/// Benchmark: compile and write one frame into a reused packet.
fn bench_write_frame(c: &mut Criterion) {
    let context = r1q2_context();
    let old = frame(0);
    let new = frame(1);
    let mut packet = PacketWriter::new(q2wire::MAX_MSGLEN);

    c.bench_function("write_frame_256", |b| {
        b.iter(|| {
            packet.reset();
            for (entnum, (from, to)) in (1..).zip(old.iter().zip(&new)) {
                let delta = context.make_entity_delta(Some(from), to, false);
                black_box(context.write_entity_delta(&mut packet, entnum, &delta).unwrap());
            }
            black_box(q2wire::vanilla::write_packet_entities_end(&mut packet).unwrap());
            packet.len()
        });
    });
}

/// Benchmark: zpacket compression of reliable messages of growing size.
fn bench_zpacket(c: &mut Criterion) {
    let context = r1q2_context();
    let mut deflater = Lz4Block::default();
    let mut group = c.benchmark_group("zpacket");

    for count in [8usize, 32, 128] {
        let mut message = PacketWriter::new(q2wire::MAX_MSGLEN);
        for _ in 0..count {
            SimpleMessage::Print {
                level: print_level::MEDIUM,
                text: b"Player ate Player's rocket",
            }
            .write(&mut message)
            .unwrap();
        }
        let mut packet = PacketWriter::new(q2wire::MAX_MSGLEN);

        group.bench_with_input(
            BenchmarkId::from_parameter(message.len()),
            message.as_slice(),
            |b, payload| {
                b.iter(|| {
                    packet.reset();
                    black_box(
                        context
                            .write_zpacket(&mut packet, &mut deflater, payload)
                            .unwrap(),
                    );
                    packet.len()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_entity_deltas, bench_write_frame, bench_zpacket);
criterion_main!(benches);
