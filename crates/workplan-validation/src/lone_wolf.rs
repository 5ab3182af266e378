//! Steps that can never receive a token.

use workplan_core::Workplan;

use crate::{PositionId, ValidationAspects, ValidationError, WorkplanValidator};

/// A step is a lone wolf unless one of its inputs is the start connector or
/// every input is produced by some other step. Unwired inputs count as not
/// produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoneWolfValidator;

impl WorkplanValidator for LoneWolfValidator {
    fn aspect(&self) -> ValidationAspects {
        ValidationAspects::LONE_WOLF
    }

    fn validate(&self, workplan: &Workplan) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for step in workplan.steps() {
            let fed_by_entry = step.inputs().iter().flatten().any(|input| {
                workplan
                    .connector(*input)
                    .map(|c| c.is_entry())
                    .unwrap_or(false)
            });
            if fed_by_entry {
                continue;
            }
            let all_produced = step.inputs().iter().all(|input| match input {
                Some(input) => workplan
                    .producers_of(*input)
                    .iter()
                    .any(|(producer, _)| *producer != step.id()),
                None => false,
            });
            if !all_produced {
                errors.push(ValidationError::new(
                    self.aspect(),
                    PositionId::Step(step.id()),
                    "has an input no other step produces",
                ));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workplan_core::{NodeClassification, OutputDescription, Step, StepKind};

    #[test]
    fn test_orphan_input_flagged_until_wired_to_entry() {
        let mut workplan = Workplan::new("lone_wolf");
        let start = workplan
            .add_connector("Start", NodeClassification::Start)
            .unwrap();
        let end = workplan.add_connector("End", NodeClassification::End).unwrap();
        let loose = workplan
            .add_connector("Loose", NodeClassification::Intermediate)
            .unwrap();
        let step = workplan
            .add_step(
                Step::builder("assemble", StepKind::Task)
                    .input(loose)
                    .output(end)
                    .outcome(OutputDescription::success("succeed"))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let errors = LoneWolfValidator.validate(&workplan);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].position, PositionId::Step(step));

        workplan.set_step_input(step, 0, Some(start)).unwrap();
        assert!(LoneWolfValidator.validate(&workplan).is_empty());
    }

    #[test]
    fn test_self_fed_step_is_flagged() {
        let mut workplan = Workplan::new("self_loop");
        let start = workplan
            .add_connector("Start", NodeClassification::Start)
            .unwrap();
        let lap = workplan
            .add_connector("Lap", NodeClassification::Intermediate)
            .unwrap();
        let first = workplan
            .add_step(
                Step::builder("first", StepKind::Task)
                    .input(start)
                    .output(lap)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let circle = workplan
            .add_step(
                Step::builder("circle", StepKind::Task)
                    .input(lap)
                    .output(lap)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert!(LoneWolfValidator.validate(&workplan).is_empty());

        workplan.set_step_output(first, 0, None).unwrap();
        let errors = LoneWolfValidator.validate(&workplan);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].position, PositionId::Step(circle));
    }

    #[test]
    fn test_unwired_input_is_flagged() {
        let mut workplan = Workplan::new("unwired");
        let step = workplan
            .add_step(
                Step::builder("orphan", StepKind::Task)
                    .inputs([None])
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let errors = LoneWolfValidator.validate(&workplan);
        assert_eq!(errors[0].position, PositionId::Step(step));
    }
}
