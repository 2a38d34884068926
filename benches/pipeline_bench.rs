//! Benchmarks for the hot paths inside one pipeline run: state machine
//! transitions and context writes.

use std::sync::Arc;

use artemis::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn state_machine_transition_benchmark(c: &mut Criterion) {
    c.bench_function("state_machine_start_init_stage_cycle", |b| {
        b.iter(|| {
            let machine = StateMachine::new(Arc::new(NoOpEventSink));
            machine.transition(Event::Start, "begin", std::collections::HashMap::new()).unwrap();
            machine
                .transition(Event::InitDone, "ready", std::collections::HashMap::new())
                .unwrap();
            machine
                .transition(Event::StageStart, "stage", std::collections::HashMap::new())
                .unwrap();
            black_box(
                machine
                    .transition(Event::StageComplete, "done", std::collections::HashMap::new())
                    .unwrap(),
            )
        });
    });
}

fn context_write_benchmark(c: &mut Criterion) {
    c.bench_function("context_write_1000_keys", |b| {
        b.iter(|| {
            let context = Context::new();
            for i in 0..1000 {
                context
                    .write("development", format!("key_{i}"), serde_json::json!(i))
                    .unwrap();
            }
            black_box(context.namespace("development").len())
        });
    });
}

criterion_group!(benches, state_machine_transition_benchmark, context_write_benchmark);
criterion_main!(benches);
