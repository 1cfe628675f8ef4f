use log::{debug, trace};

use super::{CompiledGraph, PassContext};
use crate::utils::Metric;
use crate::{Backend, Error, Result};

/// Summary of an executed frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Names of passes that got executed, in order
    pub executed: Vec<String>,

    /// Names of passes that got culled, in submission order
    pub culled: Vec<String>,

    /// Number of physical resources allocated for transients
    pub physical_allocations: usize,
}

impl<B> CompiledGraph<B>
where
    B: Backend,
{
    /// Runs passes in the compiled order.
    ///
    /// Transients get allocated right before their first use and released
    /// right after their last one; a failing pass aborts the frame (releasing
    /// whatever's been allocated so far).
    pub fn execute(mut self, backend: &mut B) -> Result<ExecutionReport> {
        let _metric = Metric::new("execute");

        let mut slots: Vec<Option<B::Resource>> =
            vec![None; self.slots.len()];

        let mut report = ExecutionReport {
            culled: self
                .culled
                .iter()
                .map(|&pass| self.passes[pass].name.clone())
                .collect(),
            ..Default::default()
        };

        let result = self.run(backend, &mut slots, &mut report);

        for slot in slots.iter_mut() {
            if let Some(resource) = slot.take() {
                backend.release(resource);
            }
        }

        result?;

        debug!(
            "Executed graph: passes={}, culled={}, allocations={}",
            report.executed.len(),
            report.culled.len(),
            report.physical_allocations,
        );

        Ok(report)
    }

    fn run(
        &mut self,
        backend: &mut B,
        slots: &mut [Option<B::Resource>],
        report: &mut ExecutionReport,
    ) -> Result<()> {
        let mut bindings: Vec<Option<B::Resource>> = self
            .resources
            .iter()
            .map(|resource| resource.external.clone())
            .collect();

        for step in 0..self.schedule.len() {
            let pass_id = self.schedule[step];

            for (slot_id, slot) in self.slots.iter().enumerate() {
                if slot.first_use == step {
                    let resource = backend.allocate(&slot.label, &slot.desc)?;

                    slots[slot_id] = Some(resource);
                    report.physical_allocations += 1;
                }
            }

            for (resource, _) in &self.passes[pass_id].accesses {
                if let Some(slot_id) = self.resource_slots[resource.0] {
                    bindings[resource.0] = slots[slot_id].clone();
                }
            }

            let pass = &mut self.passes[pass_id];

            trace!("Executing pass: {}", pass.name);

            if let Some(run) = pass.run.take() {
                let _metric = Metric::new(&pass.name);

                let mut ctx = PassContext {
                    pass: &pass.name,
                    graph: self.id,
                    accesses: &pass.accesses,
                    resources: &self.resources,
                    bindings: &bindings,
                    backend,
                };

                run(&mut ctx).map_err(|err| Error::PassFailed {
                    pass: pass.name.clone(),
                    source: Box::new(err),
                })?;
            }

            report.executed.push(pass.name.clone());

            for (slot_id, slot) in self.slots.iter().enumerate() {
                if slot.last_use == step {
                    if let Some(resource) = slots[slot_id].take() {
                        backend.release(resource);
                    }
                }
            }
        }

        Ok(())
    }
}
