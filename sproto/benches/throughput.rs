//! Throughput benchmarks: messages per second over the public blocking API.
//!
//! Measures REQ/REP and PUSH/PULL round trips over `inproc://`, which
//! isolates the protocol FSM + pipe bookkeeping cost from OS socket
//! syscall overhead. `MESSAGE_COUNT` amortizes per-iteration socket setup.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sproto::socket::Socket;
use sproto::{Message, ProtocolKind, SocketOptions};
use std::thread;
use std::time::Duration;

const MESSAGE_SIZES: &[usize] = &[64, 256, 1024, 4096, 16384];
const MESSAGE_COUNT: usize = 10_000;

fn req_rep_throughput(c: &mut Criterion) {
    sproto::dev_tracing::init_tracing();
    let mut group = c.benchmark_group("throughput/sproto/req_rep");
    group.measurement_time(Duration::from_secs(15));
    group.sample_size(10);

    for (i, &size) in MESSAGE_SIZES.iter().enumerate() {
        let payload = Bytes::from(vec![0u8; size]);
        group.throughput(Throughput::Bytes((size * MESSAGE_COUNT) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let addr = format!("inproc://bench-req-rep-{i}");
                let rep = Socket::new(ProtocolKind::Rep, SocketOptions::new());
                rep.bind(&addr).unwrap();
                let req = Socket::new(ProtocolKind::Req, SocketOptions::new());
                req.connect(&addr).unwrap();
                thread::sleep(Duration::from_millis(20));

                let server = thread::spawn(move || {
                    for _ in 0..MESSAGE_COUNT {
                        loop {
                            match rep.recv() {
                                Ok(msg) => {
                                    rep.send(msg).ok();
                                    break;
                                }
                                Err(_) => thread::yield_now(),
                            }
                        }
                    }
                });

                for _ in 0..MESSAGE_COUNT {
                    req.send(Message::from_body(black_box(payload.clone()))).unwrap();
                    loop {
                        if req.recv().is_ok() {
                            break;
                        }
                        thread::yield_now();
                    }
                }
                server.join().unwrap();
            });
        });
    }
    group.finish();
}

fn push_pull_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput/sproto/push_pull");
    group.measurement_time(Duration::from_secs(15));
    group.sample_size(10);

    for (i, &size) in MESSAGE_SIZES.iter().enumerate() {
        let payload = Bytes::from(vec![0u8; size]);
        group.throughput(Throughput::Bytes((size * MESSAGE_COUNT) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let addr = format!("inproc://bench-push-pull-{i}");
                let pull = Socket::new(ProtocolKind::Pull, SocketOptions::new());
                pull.bind(&addr).unwrap();
                let push = Socket::new(ProtocolKind::Push, SocketOptions::new());
                push.connect(&addr).unwrap();
                thread::sleep(Duration::from_millis(20));

                let receiver = thread::spawn(move || {
                    let mut received = 0;
                    while received < MESSAGE_COUNT {
                        if pull.recv().is_ok() {
                            received += 1;
                        } else {
                            thread::yield_now();
                        }
                    }
                });

                for _ in 0..MESSAGE_COUNT {
                    loop {
                        match push.send(Message::from_body(black_box(payload.clone()))) {
                            Ok(()) => break,
                            Err(_) => thread::yield_now(),
                        }
                    }
                }
                receiver.join().unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(60))
        .warm_up_time(Duration::from_secs(5))
        .sample_size(10);
    targets = req_rep_throughput, push_pull_throughput
);
criterion_main!(benches);
