use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use workplan_core::{
    ConnectorId, EngineConfig, FixedOutcome, NodeClassification, OutputDescription, Step,
    StepKind, Workplan, WorkplanEngine,
};

/// Start -> task_0 -> ... -> task_{len-1} -> End
fn chain(len: usize) -> Workplan {
    let mut workplan = Workplan::new(format!("chain_{}", len));
    let mut previous = workplan
        .add_connector("Start", NodeClassification::Start)
        .unwrap();
    for i in 0..len {
        let next: ConnectorId = if i + 1 == len {
            workplan.add_connector("End", NodeClassification::End).unwrap()
        } else {
            workplan
                .add_connector(format!("after_{}", i), NodeClassification::Intermediate)
                .unwrap()
        };
        workplan
            .add_step(
                Step::builder(format!("task_{}", i), StepKind::Task)
                    .input(previous)
                    .output(next)
                    .outcome(OutputDescription::success("done"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        previous = next;
    }
    workplan
}

fn benchmark_linear_workplan(c: &mut Criterion) {
    let mut group = c.benchmark_group("workflow_execution");
    group.measurement_time(Duration::from_secs(10));

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let engine = &WorkplanEngine::new(EngineConfig::new());
    let dispatcher = &FixedOutcome("done".into());

    for len in [1usize, 10, 50] {
        let workplan = chain(len);
        group.bench_with_input(BenchmarkId::new("linear", len), &workplan, |b, workplan| {
            b.to_async(&runtime).iter(move || async move {
                let result = engine.run(workplan, &(), dispatcher).await.unwrap();
                assert!(result.is_success());
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_linear_workplan);
criterion_main!(benches);
