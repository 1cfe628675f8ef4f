use std::cmp::Reverse;
use std::collections::BinaryHeap;

use derivative::Derivative;
use log::debug;
use petgraph::algo::{has_path_connecting, kosaraju_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::{
    FrameGraph, GraphId, Handle, PassNode, ResourceDesc, ResourceEntry,
    ResourceId,
};
use crate::utils::Metric;
use crate::{Backend, Error, Result};

/// Why one pass has to run before another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Dependency {
    /// Target reads what source wrote
    Data(ResourceId),

    /// Target overwrites what source read or wrote
    Order(ResourceId),
}

impl Dependency {
    fn resource(self) -> ResourceId {
        match self {
            Dependency::Data(id) | Dependency::Order(id) => id,
        }
    }
}

/// Physical allocation shared by transients whose lifetimes don't overlap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    pub desc: ResourceDesc,

    /// Index (in the schedule) of the first pass using this slot
    pub first_use: usize,

    /// Index (in the schedule) of the last pass using this slot
    pub last_use: usize,

    /// Name of the first resource placed in this slot; used as a label
    pub label: String,
}

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct CompiledGraph<B>
where
    B: Backend,
{
    pub(crate) id: GraphId,
    pub(crate) resources: Vec<ResourceEntry<B::Resource>>,
    pub(crate) passes: Vec<PassNode<B>>,
    pub(crate) schedule: Vec<usize>,
    pub(crate) culled: Vec<usize>,
    pub(crate) slots: Vec<Slot>,
    pub(crate) resource_slots: Vec<Option<usize>>,
}

impl<B> CompiledGraph<B>
where
    B: Backend,
{
    /// Returns names of passes that are going to be executed, in order.
    pub fn schedule(&self) -> Vec<&str> {
        self.schedule
            .iter()
            .map(|&pass| self.passes[pass].name.as_str())
            .collect()
    }

    /// Returns names of passes that are not going to be executed, in
    /// submission order.
    pub fn culled(&self) -> Vec<&str> {
        self.culled
            .iter()
            .map(|&pass| self.passes[pass].name.as_str())
            .collect()
    }

    /// Returns the physical slot given transient got assigned to; `None` for
    /// external resources and for transients used only by culled passes.
    pub fn physical_slot<T>(&self, handle: Handle<T>) -> Option<usize> {
        if handle.graph != self.id {
            return None;
        }

        self.resource_slots.get(handle.id.0).copied().flatten()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }
}

impl<B> FrameGraph<B>
where
    B: Backend,
{
    /// Orders passes so that each reader runs after its writer, culls passes
    /// whose outputs nobody needs and plans memory for transients.
    pub fn compile(mut self) -> Result<CompiledGraph<B>> {
        let _metric = Metric::new("compile");

        if !self.errors.is_empty() {
            return Err(self.errors.swap_remove(0));
        }

        let deps = self.dependencies()?;
        let order = self.sort(&deps)?;
        let live = self.find_live_passes(&deps, &order);

        let (schedule, mut culled): (Vec<_>, Vec<_>) =
            order.into_iter().partition(|&pass| live[pass]);

        culled.sort_unstable();

        let (slots, resource_slots) = self.plan_slots(&schedule);

        debug!(
            "Compiled graph: passes={}, culled={}, transients={}, slots={}",
            schedule.len(),
            culled.len(),
            resource_slots.iter().flatten().count(),
            slots.len(),
        );

        Ok(CompiledGraph {
            id: self.id,
            resources: self.resources,
            passes: self.passes,
            schedule,
            culled,
            slots,
            resource_slots,
        })
    }

    /// Walks accesses in submission order, resource by resource, and connects
    /// passes that have to run one after another.
    fn dependencies(&self) -> Result<DiGraph<usize, Dependency>> {
        #[derive(Default)]
        struct State {
            writer: Option<usize>,
            readers: Vec<usize>,

            /// Readers of a transient that no pass has written yet; they get
            /// bound to the first writer that comes later
            pending: Vec<usize>,
        }

        let mut deps = DiGraph::with_capacity(self.passes.len(), 0);

        for pass in 0..self.passes.len() {
            deps.add_node(pass);
        }

        let mut states: Vec<State> =
            (0..self.resources.len()).map(|_| Default::default()).collect();

        for (pass_id, pass) in self.passes.iter().enumerate() {
            for &(resource_id, access) in &pass.accesses {
                let resource = &self.resources[resource_id.0];
                let state = &mut states[resource_id.0];

                if access.is_read() {
                    if let Some(writer) = state.writer {
                        connect(
                            &mut deps,
                            writer,
                            pass_id,
                            Dependency::Data(resource_id),
                        );

                        state.readers.push(pass_id);
                    } else if resource.lifetime.is_external() {
                        state.readers.push(pass_id);
                    } else {
                        state.pending.push(pass_id);
                    }
                }

                if access.is_write() {
                    for reader in state.readers.drain(..) {
                        connect(
                            &mut deps,
                            reader,
                            pass_id,
                            Dependency::Order(resource_id),
                        );
                    }

                    if let Some(writer) = state.writer {
                        connect(
                            &mut deps,
                            writer,
                            pass_id,
                            Dependency::Order(resource_id),
                        );
                    } else {
                        for reader in state.pending.drain(..) {
                            // A pass can't read what only it writes later
                            if reader == pass_id {
                                return Err(Error::MissingWriter {
                                    pass: pass.name.clone(),
                                    resource: resource.name.clone(),
                                });
                            }

                            connect(
                                &mut deps,
                                pass_id,
                                reader,
                                Dependency::Data(resource_id),
                            );

                            state.readers.push(reader);
                        }
                    }

                    state.writer = Some(pass_id);
                }
            }
        }

        for (resource_id, state) in states.iter().enumerate() {
            if let Some(&reader) = state.pending.first() {
                return Err(Error::MissingWriter {
                    pass: self.passes[reader].name.clone(),
                    resource: self.resources[resource_id].name.clone(),
                });
            }
        }

        Ok(deps)
    }

    /// Sorts passes topologically; whenever there's a choice, the pass
    /// submitted earlier goes first.
    fn sort(&self, deps: &DiGraph<usize, Dependency>) -> Result<Vec<usize>> {
        let mut in_degrees: Vec<_> = deps
            .node_indices()
            .map(|node| deps.edges_directed(node, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<_> = in_degrees
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(pass, _)| Reverse(pass))
            .collect();

        let mut order = Vec::with_capacity(self.passes.len());

        while let Some(Reverse(pass)) = ready.pop() {
            order.push(pass);

            for edge in deps.edges(NodeIndex::new(pass)) {
                let target = edge.target().index();

                in_degrees[target] -= 1;

                if in_degrees[target] == 0 {
                    ready.push(Reverse(target));
                }
            }
        }

        if order.len() == self.passes.len() {
            Ok(order)
        } else {
            Err(self.describe_cycle(deps))
        }
    }

    fn describe_cycle(&self, deps: &DiGraph<usize, Dependency>) -> Error {
        let cycle = kosaraju_scc(deps)
            .into_iter()
            .filter(|component| component.len() > 1)
            .min_by_key(|component| {
                component.iter().map(|node| node.index()).min()
            })
            .unwrap_or_default();

        let edge = deps
            .edge_references()
            .filter(|edge| {
                cycle.contains(&edge.source()) && cycle.contains(&edge.target())
            })
            .filter(|edge| {
                has_path_connecting(deps, edge.target(), edge.source(), None)
            })
            .min_by_key(|edge| (edge.source().index(), edge.target().index()));

        match edge {
            Some(edge) => {
                let (first, second) = if edge.source() < edge.target() {
                    (edge.source(), edge.target())
                } else {
                    (edge.target(), edge.source())
                };

                Error::Cycle {
                    first: self.passes[first.index()].name.clone(),
                    second: self.passes[second.index()].name.clone(),
                    resource: self.resources[edge.weight().resource().0]
                        .name
                        .clone(),
                }
            }

            None => Error::Cycle {
                first: Default::default(),
                second: Default::default(),
                resource: Default::default(),
            },
        }
    }

    /// Returns which passes have to be executed: pinned ones, ones that write
    /// something that outlives the graph and ones that feed those.
    ///
    /// Writing any external resource, imported or persistent, keeps a pass
    /// alive; pinning is needed only for side effects the graph can't see
    /// (e.g. a pass that writes nothing it declares).
    fn find_live_passes(
        &self,
        deps: &DiGraph<usize, Dependency>,
        order: &[usize],
    ) -> Vec<bool> {
        let mut live: Vec<_> = self
            .passes
            .iter()
            .map(|pass| {
                pass.pinned
                    || pass.accesses.iter().any(|(resource, access)| {
                        access.is_write()
                            && self.resources[resource.0]
                                .lifetime
                                .is_external()
                    })
            })
            .collect();

        // Data flows along the order, so walking it backwards sees every
        // reader before its writer
        for &pass in order.iter().rev() {
            if live[pass] {
                continue;
            }

            live[pass] = deps.edges(NodeIndex::new(pass)).any(|edge| {
                matches!(edge.weight(), Dependency::Data(_))
                    && live[edge.target().index()]
            });
        }

        live
    }

    /// Assigns transients to physical slots, reusing a slot when its previous
    /// tenant is dead by the time the next one is born.
    fn plan_slots(
        &self,
        schedule: &[usize],
    ) -> (Vec<Slot>, Vec<Option<usize>>) {
        let mut lifetimes: Vec<Option<(usize, usize)>> =
            vec![None; self.resources.len()];

        for (step, &pass) in schedule.iter().enumerate() {
            for (resource, _) in &self.passes[pass].accesses {
                if self.resources[resource.0].lifetime.is_external() {
                    continue;
                }

                let lifetime = &mut lifetimes[resource.0];

                *lifetime = Some(match *lifetime {
                    Some((first, _)) => (first, step),
                    None => (step, step),
                });
            }
        }

        let mut transients: Vec<_> = lifetimes
            .iter()
            .enumerate()
            .filter_map(|(resource, lifetime)| Some((resource, (*lifetime)?)))
            .collect();

        transients.sort_by_key(|(resource, (first, _))| (*first, *resource));

        let mut slots: Vec<Slot> = Vec::new();
        let mut resource_slots = vec![None; self.resources.len()];

        for (resource, (first, last)) in transients {
            let entry = &self.resources[resource];

            let slot_id = slots.iter().position(|slot| {
                slot.last_use < first && slot.desc == entry.desc
            });

            let slot_id = if let Some(slot_id) = slot_id {
                slots[slot_id].last_use = last;
                slot_id
            } else {
                slots.push(Slot {
                    desc: entry.desc,
                    first_use: first,
                    last_use: last,
                    label: entry.name.clone(),
                });

                slots.len() - 1
            };

            resource_slots[resource] = Some(slot_id);
        }

        (slots, resource_slots)
    }
}

fn connect(
    deps: &mut DiGraph<usize, Dependency>,
    from: usize,
    to: usize,
    dep: Dependency,
) {
    if from == to {
        return;
    }

    let from = NodeIndex::new(from);
    let to = NodeIndex::new(to);

    match deps.find_edge(from, to) {
        Some(edge) => {
            // Data dependencies decide about culling, so they take precedence
            if let Dependency::Data(_) = dep {
                deps[edge] = dep;
            }
        }

        None => {
            deps.add_edge(from, to, dep);
        }
    }
}
