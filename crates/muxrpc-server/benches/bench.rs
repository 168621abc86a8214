use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::stream::FuturesUnordered;
use muxrpc_core::{
    dial,
    proto::{Req, simple_client::SimpleClient},
};
use muxrpc_server::server::{config::ServerConfig, lifecycle::Server};
use std::time::Instant;
use tokio::runtime::Builder;
use tokio_stream::StreamExt;
use tonic::transport::Channel;

#[derive(Clone, Copy, Debug)]
enum Call {
    Something,
    Flow,
}

impl Call {
    const fn name(self) -> &'static str {
        match self {
            Self::Something => "something",
            Self::Flow => "flow",
        }
    }
}

fn grpc_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    // The server runs in-process on an ephemeral port; every request goes
    // through the tag byte demultiplexer before reaching tonic.
    let server = rt.block_on(async {
        Server::new(ServerConfig::new("bench-server", "dc1"))
            .start()
            .await
            .expect("failed to start server")
    });
    let addr = server.local_addr();

    let concurrency_cases = [1, 8, 32];

    for call in [Call::Something, Call::Flow] {
        let mut group = c.benchmark_group(format!("grpc/{}", call.name()));

        for &concurrency in &concurrency_cases {
            group.throughput(Throughput::Elements(concurrency as u64));
            group.bench_function(format!("conc/{concurrency}"), |b| {
                b.to_async(&rt).iter_custom(|iters| async move {
                    let channel = dial::connect(addr)
                        .await
                        .expect("Failed to connect to server");

                    let start = Instant::now();
                    for _ in 0..iters {
                        run_calls(&channel, call, concurrency).await;
                    }
                    start.elapsed()
                });
            });
        }

        group.finish();
    }

    // Fresh connections pay for the tag byte hand-off on every iteration.
    let mut group = c.benchmark_group("demux/connect");
    group.bench_function("something", |b| {
        b.to_async(&rt).iter(|| async move {
            let channel = dial::connect(addr).await.expect("connect");
            run_calls(&channel, Call::Something, 1).await;
        });
    });
    group.finish();

    if let Err(errors) = rt.block_on(server.stop()) {
        eprintln!("failed to stop server: {errors:?}");
    }
}

async fn run_calls(channel: &Channel, call: Call, concurrency: usize) {
    let mut tasks = FuturesUnordered::new();

    for _ in 0..concurrency {
        let mut client = SimpleClient::new(channel.clone());

        tasks.push(tokio::spawn(async move {
            match call {
                Call::Something => {
                    let resp = client
                        .something(Req::default())
                        .await
                        .expect("unary call failed");
                    black_box(resp.into_inner());
                }
                Call::Flow => {
                    let mut stream = client
                        .flow(Req::default())
                        .await
                        .expect("stream call failed")
                        .into_inner();
                    while let Some(resp) = stream.next().await {
                        black_box(resp.expect("resp"));
                    }
                }
            }
        }));
    }

    while let Some(res) = tasks.next().await {
        res.unwrap();
    }
}

criterion_group!(benches, grpc_bench);
criterion_main!(benches);
