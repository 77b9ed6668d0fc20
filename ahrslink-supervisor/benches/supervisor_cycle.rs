use std::sync::Arc;

use ahrslink_supervisor::testing::ScriptedTransport;
use ahrslink_supervisor::{
    AlarmTable, LinkSupervisor, ManualClock, SharedSettings, StatusBoard, WatchdogFlag,
    WatchdogTable,
};
use ahrslink_types::{AhrsStatus, LinkStatusSnapshot};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

fn snapshot(link_ok: bool, n: u32) -> LinkStatusSnapshot {
    LinkStatusSnapshot::builder()
        .link_ok(link_ok)
        .remote(|c| c.crc_errors(n).retries(n * 2))
        .local(|c| c.retries(n))
        .build()
}

/// One full supervisor cycle (watchdog, exchange, alarm, publish, schedule)
fn bench_run_once(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_once");

    for readers in [0usize, 1, 8] {
        group.bench_with_input(BenchmarkId::new("readers", readers), &readers, |b, &readers| {
            let board = Arc::new(StatusBoard::new());
            let _readers: Vec<_> = (0..readers).map(|_| board.subscribe()).collect();
            let watchdog = Arc::new(WatchdogTable::new());
            watchdog.register_flag(WatchdogFlag::AHRS);

            let mut supervisor = LinkSupervisor::builder(ScriptedTransport::new().then(snapshot(true, 1)))
                .alarms(Arc::new(AlarmTable::new()))
                .watchdog(watchdog)
                .settings(Arc::new(SharedSettings::default()))
                .board(board)
                .clock(ManualClock::new())
                .build();
            supervisor.activate();

            b.iter(|| black_box(supervisor.run_once()));
        });
    }
    group.finish();
}

/// Alarm flapping between OK and WARN every cycle
fn bench_alarm_flapping(c: &mut Criterion) {
    c.bench_function("alarm_flapping_64_cycles", |b| {
        b.iter_batched(
            || {
                let mut transport = ScriptedTransport::new();
                for i in 0..64u32 {
                    transport = transport.then(snapshot(i % 2 == 0, i));
                }
                LinkSupervisor::builder(transport)
                    .clock(ManualClock::new())
                    .build()
            },
            |mut supervisor| {
                for _ in 0..64 {
                    black_box(supervisor.run_once());
                }
            },
            BatchSize::SmallInput,
        );
    });
}

/// Snapshot to published record conversion
fn bench_status_conversion(c: &mut Criterion) {
    let s = snapshot(true, 1234);
    c.bench_function("ahrs_status_from_snapshot", |b| {
        b.iter(|| AhrsStatus::from(black_box(&s)));
    });
}

criterion_group!(
    benches,
    bench_run_once,
    bench_alarm_flapping,
    bench_status_conversion
);
criterion_main!(benches);
