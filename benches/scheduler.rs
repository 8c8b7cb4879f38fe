use criterion::{criterion_group, criterion_main, Criterion, black_box};

use vantage::work::{OnDemandQueue, PriorityQueue, WorkOutcome};

fn bench_priority_queue_churn(c: &mut Criterion) {
    c.bench_function("priority_queue_churn_1k", |b| {
        b.iter(|| {
            let mut queue = PriorityQueue::new();
            for i in 0..1000u32 {
                // Spread priorities so the heap actually reorders
                queue.enqueue(black_box(i * 7 % 100), 1, Box::new(|_| Ok(WorkOutcome::Done)));
            }
            while let Some(item) = queue.dequeue() {
                black_box(item.priority());
            }
        });
    });
}

fn bench_pump_throughput(c: &mut Criterion) {
    c.bench_function("pump_1k_items_budget_300", |b| {
        b.iter(|| {
            let queue = OnDemandQueue::new("bench");
            for i in 0..1000u32 {
                queue.enqueue(i % 50, 20, Box::new(|_| Ok(WorkOutcome::Done)));
            }
            // Drain in frame-sized slices the way the render loop would
            while queue.pump(black_box(300)) > 0 {}
        });
    });
}

fn bench_pump_with_requeues(c: &mut Criterion) {
    c.bench_function("pump_requeue_heavy", |b| {
        b.iter(|| {
            let queue = OnDemandQueue::new("bench");
            for i in 0..200u32 {
                // Every item defers twice before completing
                queue.enqueue(i % 10, 5, Box::new(|a| {
                    if a.retries < 2 {
                        Ok(WorkOutcome::NotYetReady)
                    } else {
                        Ok(WorkOutcome::Done)
                    }
                }));
            }
            while queue.pump(black_box(300)) > 0 {}
        });
    });
}

criterion_group!(
    benches,
    bench_priority_queue_churn,
    bench_pump_throughput,
    bench_pump_with_requeues
);
criterion_main!(benches);
