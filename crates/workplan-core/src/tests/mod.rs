
use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    ConnectorId, NodeClassification, OutputDescription, Step, StepId, StepKind, Workplan,
};

static INIT: Once = Once::new();

pub(crate) fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Start -> mark(succeed | failed) -> End | Failed
pub(crate) struct Linear {
    pub workplan: Workplan,
    pub start: ConnectorId,
    pub end: ConnectorId,
    pub failed: ConnectorId,
    pub mark: StepId,
}

pub(crate) fn linear() -> Linear {
    let mut workplan = Workplan::new("marking");
    let start = workplan
        .add_connector("Start", NodeClassification::Start)
        .unwrap();
    let end = workplan.add_connector("End", NodeClassification::End).unwrap();
    let failed = workplan
        .add_connector("Failed", NodeClassification::Failed)
        .unwrap();
    let mark = workplan
        .add_step(
            Step::builder("mark", StepKind::Task)
                .input(start)
                .output(end)
                .output(failed)
                .outcome(OutputDescription::success("succeed"))
                .outcome(OutputDescription::failure("failed"))
                .build()
                .unwrap(),
        )
        .unwrap();
    Linear {
        workplan,
        start,
        end,
        failed,
        mark,
    }
}

/// Start -> split -> {left task, right task} -> join -> End
pub(crate) struct Parallel {
    pub workplan: Workplan,
    pub end: ConnectorId,
    pub left: StepId,
    pub right: StepId,
}

pub(crate) fn parallel() -> Parallel {
    let mut workplan = Workplan::new("assembly");
    let start = workplan
        .add_connector("Start", NodeClassification::Start)
        .unwrap();
    let end = workplan.add_connector("End", NodeClassification::End).unwrap();
    let mut mid = Vec::new();
    for name in ["left_in", "right_in", "left_out", "right_out"] {
        mid.push(
            workplan
                .add_connector(name, NodeClassification::Intermediate)
                .unwrap(),
        );
    }
    workplan
        .add_step(
            Step::builder("split", StepKind::Split)
                .input(start)
                .output(mid[0])
                .output(mid[1])
                .build()
                .unwrap(),
        )
        .unwrap();
    let mut task = |name: &str, input: ConnectorId, output: ConnectorId| {
        workplan
            .add_step(
                Step::builder(name, StepKind::Task)
                    .input(input)
                    .output(output)
                    .outcome(OutputDescription::success("done"))
                    .build()
                    .unwrap(),
            )
            .unwrap()
    };
    let left = task("mount_left", mid[0], mid[2]);
    let right = task("mount_right", mid[1], mid[3]);
    workplan
        .add_step(
            Step::builder("join", StepKind::Join)
                .input(mid[2])
                .input(mid[3])
                .output(end)
                .build()
                .unwrap(),
        )
        .unwrap();
    Parallel {
        workplan,
        end,
        left,
        right,
    }
}
