//! Benchmarks for device resolution and volume planning
//!
//! Run with: cargo bench -p pulsebar_core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pulsebar_core::{
    percent_to_native, plan_absolute, plan_step, AudioMachine, BackendConfig, BackendEvent,
    ChannelVolume, ConnectionState, DeviceDescriptor, DeviceState, ServerInfo, VolumeChange,
};

fn sink_burst(count: u32) -> Vec<BackendEvent> {
    (0..count)
        .map(|i| {
            let state = if i % 3 == 0 {
                DeviceState::Running
            } else {
                DeviceState::Suspended
            };
            BackendEvent::Sink(DeviceDescriptor::new(
                i,
                format!("alsa_output.card{}", i),
                format!("Card {}", i),
                state,
                ChannelVolume::uniform(2, percent_to_native((i % 100) as f64)),
            ))
        })
        .collect()
}

fn benchmark_sink_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolver");

    for count in [4u32, 16, 64] {
        let events = sink_burst(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("sink_list", count), &events, |b, events| {
            let config = BackendConfig {
                ignored_sinks: vec!["Card 3".to_string()],
                ..Default::default()
            };
            let mut machine = AudioMachine::new(&config);
            machine.handle(0, BackendEvent::ConnectionChanged(ConnectionState::Ready));
            machine.handle(
                0,
                BackendEvent::ServerInfo(ServerInfo::new("alsa_output.card1", "mic")),
            );

            b.iter(|| {
                for event in events {
                    black_box(machine.handle(0, event.clone()));
                }
                black_box(machine.handle(0, BackendEvent::SinkListComplete));
            });
        });
    }

    group.finish();
}

fn benchmark_volume_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("volume");

    for channels in [2usize, 8] {
        let last = ChannelVolume::uniform(channels, percent_to_native(40.0));

        group.bench_function(format!("plan_step_{}ch", channels), |b| {
            b.iter(|| {
                plan_step(
                    black_box(Some(&last)),
                    black_box(40),
                    VolumeChange::Increase,
                    black_box(5.0),
                    100,
                )
            });
        });

        group.bench_function(format!("plan_absolute_{}ch", channels), |b| {
            b.iter(|| plan_absolute(black_box(Some(&last)), black_box(65), 0, 100));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_sink_listing, benchmark_volume_planning);
criterion_main!(benches);
