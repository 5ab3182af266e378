use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use workplan_core::{NodeClassification, OutputDescription, Step, StepKind, Workplan};
use workplan_validation::{ValidationAspects, Validator};

/// `len` inspection stages, each with a rework loop back to its own input.
fn rework_chain(len: usize) -> Workplan {
    let mut workplan = Workplan::new(format!("rework_{}", len));
    let mut previous = workplan
        .add_connector("Start", NodeClassification::Start)
        .unwrap();
    for i in 0..len {
        let next = if i + 1 == len {
            workplan.add_connector("End", NodeClassification::End).unwrap()
        } else {
            workplan
                .add_connector(format!("passed_{}", i), NodeClassification::Intermediate)
                .unwrap()
        };
        let rejected = workplan
            .add_connector(format!("rejected_{}", i), NodeClassification::Intermediate)
            .unwrap();
        workplan
            .add_step(
                Step::builder(format!("inspect_{}", i), StepKind::Task)
                    .input(previous)
                    .output(next)
                    .output(rejected)
                    .outcome(OutputDescription::success("pass"))
                    .outcome(OutputDescription::failure("reject"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        workplan
            .add_step(
                Step::builder(format!("rework_{}", i), StepKind::Task)
                    .input(rejected)
                    .output(previous)
                    .outcome(OutputDescription::success("reworked"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        previous = next;
    }
    workplan
}

fn benchmark_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation");
    let validator = Validator::with_default_validators();

    for len in [10usize, 100, 500] {
        let workplan = rework_chain(len);
        group.bench_with_input(BenchmarkId::new("all_aspects", len), &workplan, |b, workplan| {
            b.iter(|| {
                let result = validator.validate(workplan, ValidationAspects::ALL);
                assert!(result.is_success());
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_validation);
criterion_main!(benches);
