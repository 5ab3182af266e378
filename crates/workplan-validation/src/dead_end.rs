//! Connectors a token can be put on but never taken from.

use workplan_core::Workplan;

use crate::{PositionId, ValidationAspects, ValidationError, WorkplanValidator};

/// A connector is a dead end when some step writes it (or it is the start
/// connector), no step reads it and it is not an exit. Connectors nobody
/// touches at all are not reported here.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadEndValidator;

impl WorkplanValidator for DeadEndValidator {
    fn aspect(&self) -> ValidationAspects {
        ValidationAspects::DEAD_END
    }

    fn validate(&self, workplan: &Workplan) -> Vec<ValidationError> {
        workplan
            .connectors()
            .filter(|connector| {
                let read = !workplan.consumers_of(connector.id()).is_empty();
                let written = !workplan.producers_of(connector.id()).is_empty();
                !read && !connector.is_exit() && (written || connector.is_entry())
            })
            .map(|connector| {
                ValidationError::new(
                    self.aspect(),
                    PositionId::Connector(connector.id()),
                    "receives tokens that no step consumes",
                )
            })
            .collect()
    }
}
