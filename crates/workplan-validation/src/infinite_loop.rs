//! Cycles a token can enter but never leave.

use petgraph::algo::tarjan_scc;
use workplan_core::Workplan;

use crate::graph::{FlowGraph, FlowNode};
use crate::{PositionId, ValidationAspects, ValidationError, WorkplanValidator};

/// Reports every cycle from which no exit connector is reachable. Rework
/// loops with an escape route are fine. One defect per cycle, attached to
/// its lowest step id.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfiniteLoopValidator;

impl WorkplanValidator for InfiniteLoopValidator {
    fn aspect(&self) -> ValidationAspects {
        ValidationAspects::INFINITE_LOOP
    }

    fn validate(&self, workplan: &Workplan) -> Vec<ValidationError> {
        let flow = FlowGraph::build(workplan);
        let escapes = flow.reaching(
            workplan
                .end_connectors()
                .map(|c| FlowNode::Connector(c.id())),
        );

        let mut errors = Vec::new();
        for component in tarjan_scc(&flow.graph) {
            // connectors and steps alternate, so any cycle has two or more nodes
            if component.len() < 2 || component.iter().any(|n| escapes.contains(n)) {
                continue;
            }
            let mut steps: Vec<_> = component
                .iter()
                .filter_map(|n| match flow.graph[*n] {
                    FlowNode::Step(id) => Some(id),
                    FlowNode::Connector(_) => None,
                })
                .collect();
            steps.sort();
            let Some(&first) = steps.first() else {
                continue;
            };
            let names: Vec<_> = steps
                .iter()
                .filter_map(|id| workplan.step(*id))
                .map(|s| s.name.as_str())
                .collect();
            errors.push(ValidationError::new(
                self.aspect(),
                PositionId::Step(first),
                format!("is part of a loop with no way out: {}", names.join(" -> ")),
            ));
        }
        errors.sort_by_key(|e| match e.position {
            PositionId::Step(id) => id.0,
            _ => 0,
        });
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workplan_core::{ConnectorId, NodeClassification, OutputDescription, Step, StepId, StepKind};

    struct Rework {
        workplan: Workplan,
        end: ConnectorId,
        inspect: StepId,
        rework: StepId,
    }

    /// Start -> inspect(pass -> End | reject -> Bad), Bad -> rework -> Start
    fn rework() -> Rework {
        let mut workplan = Workplan::new("rework");
        let start = workplan
            .add_connector("Start", NodeClassification::Start)
            .unwrap();
        let end = workplan.add_connector("End", NodeClassification::End).unwrap();
        let bad = workplan
            .add_connector("Bad", NodeClassification::Intermediate)
            .unwrap();
        let inspect = workplan
            .add_step(
                Step::builder("inspect", StepKind::Task)
                    .input(start)
                    .output(end)
                    .output(bad)
                    .outcome(OutputDescription::success("pass"))
                    .outcome(OutputDescription::failure("reject"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let rework = workplan
            .add_step(
                Step::builder("rework", StepKind::Task)
                    .input(bad)
                    .output(start)
                    .outcome(OutputDescription::success("reworked"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Rework {
            workplan,
            end,
            inspect,
            rework,
        }
    }

    #[test]
    fn test_rework_loop_with_exit_passes() {
        let fixture = rework();
        assert!(InfiniteLoopValidator.validate(&fixture.workplan).is_empty());
    }

    #[test]
    fn test_loop_without_exit_is_reported() {
        let mut fixture = rework();
        fixture
            .workplan
            .set_step_output(fixture.inspect, 0, None)
            .unwrap();
        assert!(fixture.workplan.connector(fixture.end).is_some());

        let errors = InfiniteLoopValidator.validate(&fixture.workplan);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].position, PositionId::Step(fixture.inspect));
        assert!(errors[0].message.contains("inspect -> rework"));
    }

    #[test]
    fn test_unreachable_loop_is_still_reported() {
        let mut fixture = rework();
        let a = fixture
            .workplan
            .add_connector("Spin A", NodeClassification::Intermediate)
            .unwrap();
        let b = fixture
            .workplan
            .add_connector("Spin B", NodeClassification::Intermediate)
            .unwrap();
        let spin = |name: &str, from: ConnectorId, to: ConnectorId| {
            Step::builder(name, StepKind::Pass { outcome: 0 })
                .input(from)
                .output(to)
                .build()
                .unwrap()
        };
        let first = fixture.workplan.add_step(spin("spin_a", a, b)).unwrap();
        fixture.workplan.add_step(spin("spin_b", b, a)).unwrap();

        let errors = InfiniteLoopValidator.validate(&fixture.workplan);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].position, PositionId::Step(first));
        assert!(first > fixture.rework);
    }

    #[test]
    fn test_acyclic_workplan_passes() {
        let mut workplan = Workplan::new("straight");
        let start = workplan
            .add_connector("Start", NodeClassification::Start)
            .unwrap();
        let scrap = workplan
            .add_connector("Scrap", NodeClassification::Failed)
            .unwrap();
        workplan
            .add_step(
                Step::builder("discard", StepKind::Task)
                    .input(start)
                    .output(scrap)
                    .outcome(OutputDescription::failure("scrapped"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert!(InfiniteLoopValidator.validate(&workplan).is_empty());
    }
}
