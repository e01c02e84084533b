//! Stream throughput over an in-memory cursor
//!
//! Measures the cost of the fetch task, channel hand-off and event delivery
//! for different high-water marks.
//!
//! Run with: cargo bench --bench stream_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use durable_cursor::{ConnectionHandle, Cursor, CursorStream, Result, StreamEvent, StreamOptions};
use futures::StreamExt;

struct CountingCursor {
    remaining: u64,
}

impl Cursor for CountingCursor {
    type Row = u64;

    async fn next(&mut self) -> Result<Option<u64>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(self.remaining))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

async fn consume(rows: u64, high_water_mark: usize) -> u64 {
    let handle = ConnectionHandle::new(());
    let mut stream = CursorStream::new(
        Some(CountingCursor { remaining: rows }),
        &handle,
        StreamOptions { high_water_mark },
    )
    .await
    .expect("handle is open");

    let mut sum = 0u64;
    while let Some(event) = stream.next().await {
        if let StreamEvent::Data(v) = event {
            sum = sum.wrapping_add(v);
        }
    }
    sum
}

fn stream_throughput(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime");

    let rows = 10_000u64;
    let mut group = c.benchmark_group("cursor_stream");
    group.throughput(Throughput::Elements(rows));

    for high_water_mark in [1usize, 16, 256] {
        group.bench_with_input(
            BenchmarkId::new("high_water_mark", high_water_mark),
            &high_water_mark,
            |b, &hwm| {
                b.to_async(&runtime)
                    .iter(|| async move { black_box(consume(rows, hwm).await) });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, stream_throughput);
criterion_main!(benches);
