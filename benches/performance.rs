use std::sync::Arc;
use std::thread;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use hopflow::core::types::{Row, Value};
use hopflow::exec::RowQueue;
use hopflow::{EngineConfig, Executor, GraphMeta, HopMeta, StepMeta, StepRegistry};

const ROWS: u64 = 100_000;

fn bench_queue_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_queue");
    group.throughput(Throughput::Elements(ROWS));
    for capacity in [16, 10_000] {
        group.bench_function(format!("handoff_cap_{capacity}"), |b| {
            b.iter(|| {
                let q = Arc::new(RowQueue::standalone(capacity));
                let producer = {
                    let q = Arc::clone(&q);
                    thread::spawn(move || {
                        for i in 0..ROWS as i64 {
                            q.put(Row::new(vec![Value::Integer(i)])).unwrap();
                        }
                        q.mark_done();
                    })
                };
                let mut n = 0u64;
                while q.get().is_some() {
                    n += 1;
                }
                producer.join().unwrap();
                assert_eq!(n, ROWS);
            })
        });
    }
    group.finish();
}

fn bench_generate_filter_dummy(c: &mut Criterion) {
    let graph = GraphMeta::new("bench")
        .step(StepMeta::new("gen", "generate").with_config(serde_json::json!({
            "rows": ROWS,
            "fields": [{"name": "tag", "value": "x"}],
            "sequence_field": "n"
        })))
        .step(
            StepMeta::new("even", "filter")
                .with_config(serde_json::json!({ "condition": "n % 2 == 0" })),
        )
        .step(StepMeta::new("sink", "dummy"))
        .hop(HopMeta::new("gen", "even"))
        .hop(HopMeta::new("even", "sink"));
    let registry = StepRegistry::new();
    let config = EngineConfig::default();

    let mut group = c.benchmark_group("executor");
    group.throughput(Throughput::Elements(ROWS));
    group.sample_size(10);
    group.bench_function("generate_filter_dummy", |b| {
        b.iter(|| {
            let res = Executor::execute(&graph, &config, &registry).unwrap();
            assert!(res.is_success());
        })
    });
    group.finish();
}

criterion_group!(performance, bench_queue_handoff, bench_generate_filter_dummy);
criterion_main!(performance);
