//! Step/connector flow graph shared by the graph-based passes.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};
use std::collections::{HashMap, HashSet};
use workplan_core::{ConnectorId, Step, StepId, Workplan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum FlowNode {
    Connector(ConnectorId),
    Step(StepId),
}

/// Directed graph with an edge connector -> step for every input slot and
/// step -> connector for every selected output slot.
pub(crate) struct FlowGraph {
    pub graph: DiGraph<FlowNode, ()>,
    index: HashMap<FlowNode, NodeIndex>,
}

impl FlowGraph {
    /// Graph over all outputs.
    pub fn build(workplan: &Workplan) -> Self {
        Self::build_with(workplan, |step| (0..step.outputs().len()).collect())
    }

    /// Graph over the outputs chosen by `outputs` for each step.
    pub fn build_with<F>(workplan: &Workplan, outputs: F) -> Self
    where
        F: Fn(&Step) -> Vec<usize>,
    {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for connector in workplan.connectors() {
            let node = FlowNode::Connector(connector.id());
            index.insert(node, graph.add_node(node));
        }
        for step in workplan.steps() {
            let node = FlowNode::Step(step.id());
            index.insert(node, graph.add_node(node));
        }
        for step in workplan.steps() {
            let step_index = index[&FlowNode::Step(step.id())];
            for input in step.inputs().iter().flatten() {
                if let Some(&from) = index.get(&FlowNode::Connector(*input)) {
                    graph.update_edge(from, step_index, ());
                }
            }
            for slot in outputs(step) {
                let Some(Some(output)) = step.outputs().get(slot) else {
                    continue;
                };
                if let Some(&to) = index.get(&FlowNode::Connector(*output)) {
                    graph.update_edge(step_index, to, ());
                }
            }
        }
        Self { graph, index }
    }

    pub fn node(&self, node: FlowNode) -> Option<NodeIndex> {
        self.index.get(&node).copied()
    }

    /// Every node from which one of `targets` is reachable, targets included.
    pub fn reaching(&self, targets: impl IntoIterator<Item = FlowNode>) -> HashSet<NodeIndex> {
        let reversed = Reversed(&self.graph);
        let mut seen = HashSet::new();
        for target in targets {
            let Some(start) = self.node(target) else {
                continue;
            };
            if seen.contains(&start) {
                continue;
            }
            let mut bfs = Bfs::new(reversed, start);
            while let Some(node) = bfs.next(reversed) {
                seen.insert(node);
            }
        }
        seen
    }
}
