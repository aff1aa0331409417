//! # Commands Buffer Benchmark
//!
//! Measures write and read throughput of the commands buffer for a
//! typical tick: a few thousand small modify records.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use physbridge_core::{CommandsBuffer, Quat, Vec3};

const COMMAND_COUNT: u32 = 4_096;

fn fill(buffer: &mut CommandsBuffer) {
    for pcid in 0..COMMAND_COUNT {
        buffer.write_operator(1);
        buffer.write_command(106);
        buffer.write(pcid);
        buffer.write(Vec3::new(pcid as f32, 1.0, 2.0));
        buffer.write(Quat::IDENTITY);
        buffer.write_opt(Some(true));
    }
}

fn bench_write_preallocated(c: &mut Criterion) {
    let mut buffer = CommandsBuffer::new(256 * 1024);

    c.bench_function("buffer_write_4k_preallocated", |b| {
        b.iter(|| {
            buffer.reset();
            fill(&mut buffer);
            black_box(buffer.cursor())
        });
    });
}

fn bench_write_growing(c: &mut Criterion) {
    c.bench_function("buffer_write_4k_growing", |b| {
        b.iter(|| {
            let mut buffer = CommandsBuffer::new(64);
            fill(&mut buffer);
            black_box(buffer.capacity())
        });
    });
}

fn bench_read(c: &mut Criterion) {
    let mut writer = CommandsBuffer::new(256 * 1024);
    fill(&mut writer);
    let mut reader = CommandsBuffer::from_bytes(writer.into_bytes());

    c.bench_function("buffer_read_4k", |b| {
        b.iter(|| {
            let bytes = reader.take_bytes();
            reader.attach(bytes);
            let mut sum = 0.0f32;
            for _ in 0..reader.commands_count() {
                let _operator = reader.read_operator();
                let _command = reader.read_command();
                let _pcid = reader.read::<u32>();
                sum += reader.read::<Vec3>().x;
                let _rotation = reader.read::<Quat>();
                let _flag = reader.read_opt::<bool>();
            }
            black_box(sum)
        });
    });
}

criterion_group!(benches, bench_write_preallocated, bench_write_growing, bench_read);
criterion_main!(benches);
