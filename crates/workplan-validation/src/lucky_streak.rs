//! Is there a way through when everything goes right?

use petgraph::visit::Bfs;
use workplan_core::{NodeClassification, Step, Workplan};

use crate::graph::{FlowGraph, FlowNode};
use crate::{PositionId, ValidationAspects, ValidationError, WorkplanValidator};

/// Requires a path from the start connector to an `End` connector that only
/// follows success outputs. Splits and joins forward on all outputs, a pass
/// step on its fixed outcome. Reaching a `Failed` exit does not count.
#[derive(Debug, Clone, Copy, Default)]
pub struct LuckyStreakValidator;

impl WorkplanValidator for LuckyStreakValidator {
    fn aspect(&self) -> ValidationAspects {
        ValidationAspects::LUCKY_STREAK
    }

    fn validate(&self, workplan: &Workplan) -> Vec<ValidationError> {
        let Some(start) = workplan.start_connector() else {
            return vec![ValidationError::new(
                self.aspect(),
                PositionId::Workplan,
                "has no start connector",
            )];
        };
        let flow = FlowGraph::build_with(workplan, Step::success_outputs);
        let Some(origin) = flow.node(FlowNode::Connector(start.id())) else {
            return Vec::new();
        };

        let mut bfs = Bfs::new(&flow.graph, origin);
        while let Some(node) = bfs.next(&flow.graph) {
            if let FlowNode::Connector(id) = flow.graph[node] {
                let is_end = workplan
                    .connector(id)
                    .map(|c| c.classification == NodeClassification::End)
                    .unwrap_or(false);
                if is_end {
                    return Vec::new();
                }
            }
        }
        vec![ValidationError::new(
            self.aspect(),
            PositionId::Connector(start.id()),
            "has no all-success path to an end connector",
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workplan_core::{ConnectorId, OutputDescription, StepKind};

    fn inspection(pass_to: NodeClassification) -> (Workplan, ConnectorId) {
        let mut workplan = Workplan::new("inspection");
        let start = workplan
            .add_connector("Start", NodeClassification::Start)
            .unwrap();
        let target = workplan.add_connector("Target", pass_to).unwrap();
        let scrap = workplan
            .add_connector("Scrap", NodeClassification::Failed)
            .unwrap();
        workplan
            .add_step(
                Step::builder("inspect", StepKind::Task)
                    .input(start)
                    .output(target)
                    .output(scrap)
                    .outcome(OutputDescription::success("pass"))
                    .outcome(OutputDescription::failure("reject"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        (workplan, start)
    }

    #[test]
    fn test_success_path_found() {
        let (workplan, _) = inspection(NodeClassification::End);
        assert!(LuckyStreakValidator.validate(&workplan).is_empty());
    }

    #[test]
    fn test_failed_exit_does_not_count() {
        let (workplan, start) = inspection(NodeClassification::Failed);
        let errors = LuckyStreakValidator.validate(&workplan);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].position, PositionId::Connector(start));
    }

    #[test]
    fn test_failure_output_is_not_followed() {
        let mut workplan = Workplan::new("only_on_failure");
        let start = workplan
            .add_connector("Start", NodeClassification::Start)
            .unwrap();
        let end = workplan.add_connector("End", NodeClassification::End).unwrap();
        let dead = workplan
            .add_connector("Dead", NodeClassification::Intermediate)
            .unwrap();
        workplan
            .add_step(
                Step::builder("inspect", StepKind::Task)
                    .input(start)
                    .output(dead)
                    .output(end)
                    .outcome(OutputDescription::success("pass"))
                    .outcome(OutputDescription::failure("reject"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(LuckyStreakValidator.validate(&workplan).len(), 1);
    }

    #[test]
    fn test_split_and_pass_forward() {
        let mut workplan = Workplan::new("split");
        let start = workplan
            .add_connector("Start", NodeClassification::Start)
            .unwrap();
        let end = workplan.add_connector("End", NodeClassification::End).unwrap();
        let left = workplan
            .add_connector("Left", NodeClassification::Intermediate)
            .unwrap();
        let right = workplan
            .add_connector("Right", NodeClassification::Intermediate)
            .unwrap();
        workplan
            .add_step(
                Step::builder("split", StepKind::Split)
                    .input(start)
                    .output(left)
                    .output(right)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        workplan
            .add_step(
                Step::builder("route", StepKind::Pass { outcome: 1 })
                    .input(right)
                    .outputs([None, Some(end)])
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert!(LuckyStreakValidator.validate(&workplan).is_empty());
    }

    #[test]
    fn test_missing_start_is_reported_on_workplan() {
        let workplan = Workplan::new("empty");
        let errors = LuckyStreakValidator.validate(&workplan);
        assert_eq!(errors[0].position, PositionId::Workplan);
    }
}
