//! Packing model: bins, items, objective, and solution checks.

use serde::Serialize;

/// A bin and its available capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bin {
    pub cpu: u64,
    pub memory: u64,
}

/// An item and its demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Item {
    pub cpu: u64,
    pub memory: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    Maximize,
    Minimize,
}

/// Optimization target over the idle totals left after packing.
///
/// When both dimensions are selected their sum is optimized in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Objective {
    pub sense: Sense,
    pub idle_cpu: bool,
    pub idle_memory: bool,
}

impl Objective {
    pub const fn new(sense: Sense, idle_cpu: bool, idle_memory: bool) -> Self {
        Self {
            sense,
            idle_cpu,
            idle_memory,
        }
    }

    /// Objective value for the given idle totals.
    pub fn value(&self, idle_cpu_total: u64, idle_memory_total: u64) -> u64 {
        let cpu = if self.idle_cpu { idle_cpu_total } else { 0 };
        let memory = if self.idle_memory { idle_memory_total } else { 0 };
        cpu.saturating_add(memory)
    }

    /// Whether `candidate` is strictly better than `incumbent`.
    pub fn improves(&self, candidate: u64, incumbent: u64) -> bool {
        match self.sense {
            Sense::Maximize => candidate > incumbent,
            Sense::Minimize => candidate < incumbent,
        }
    }
}

/// A complete assignment and its objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Solution {
    /// `assignment[j]` is the bin index item `j` is packed into.
    pub assignment: Vec<usize>,
    pub idle_cpu: u64,
    pub idle_memory: u64,
    pub objective: u64,
}

impl Solution {
    /// Whether item `item` is packed into bin `bin` (`x[bin][item] == 1`).
    pub fn is_assigned(&self, bin: usize, item: usize) -> bool {
        self.assignment.get(item) == Some(&bin)
    }
}

/// One packing problem: every item into exactly one bin, capacities held
/// on both dimensions.
#[derive(Debug, Clone, Serialize)]
pub struct PackingModel {
    bins: Vec<Bin>,
    items: Vec<Item>,
    objective: Objective,
}

impl PackingModel {
    pub fn new(bins: Vec<Bin>, items: Vec<Item>, objective: Objective) -> Self {
        Self {
            bins,
            items,
            objective,
        }
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// Total (cpu, memory) capacity over all bins. Upper bounds of the idle
    /// totals.
    pub fn capacity_totals(&self) -> (u64, u64) {
        self.bins.iter().fold((0, 0), |(c, m), b| {
            (c.saturating_add(b.cpu), m.saturating_add(b.memory))
        })
    }

    /// Total (cpu, memory) demand over all items.
    pub fn demand_totals(&self) -> (u64, u64) {
        self.items.iter().fold((0, 0), |(c, m), i| {
            (c.saturating_add(i.cpu), m.saturating_add(i.memory))
        })
    }

    /// Check an assignment against every constraint of the model.
    pub fn is_feasible(&self, assignment: &[usize]) -> bool {
        if assignment.len() != self.items.len() {
            return false;
        }
        let mut used = vec![(0u64, 0u64); self.bins.len()];
        for (item, &bin) in self.items.iter().zip(assignment) {
            let Some(slot) = used.get_mut(bin) else {
                return false;
            };
            slot.0 = slot.0.saturating_add(item.cpu);
            slot.1 = slot.1.saturating_add(item.memory);
        }
        used.iter()
            .zip(&self.bins)
            .all(|(&(cpu, memory), bin)| cpu <= bin.cpu && memory <= bin.memory)
    }

    /// Build a [`Solution`] from a feasible assignment.
    pub fn evaluate(&self, assignment: &[usize]) -> Option<Solution> {
        if !self.is_feasible(assignment) {
            return None;
        }
        let (capacity_cpu, capacity_memory) = self.capacity_totals();
        let mut consumed_cpu = 0u64;
        let mut consumed_memory = 0u64;
        for item in &self.items {
            consumed_cpu = consumed_cpu.saturating_add(item.cpu);
            consumed_memory = consumed_memory.saturating_add(item.memory);
        }
        let idle_cpu = capacity_cpu - consumed_cpu;
        let idle_memory = capacity_memory - consumed_memory;
        Some(Solution {
            assignment: assignment.to_vec(),
            idle_cpu,
            idle_memory,
            objective: self.objective.value(idle_cpu, idle_memory),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> PackingModel {
        PackingModel::new(
            vec![
                Bin { cpu: 1000, memory: 1024 },
                Bin { cpu: 3000, memory: 1024 },
            ],
            vec![
                Item { cpu: 2000, memory: 512 },
                Item { cpu: 500, memory: 256 },
            ],
            Objective::new(Sense::Maximize, true, false),
        )
    }

    #[test]
    fn feasibility_checks_both_dimensions_and_bounds() {
        let m = model();
        assert!(m.is_feasible(&[1, 1]));
        assert!(m.is_feasible(&[1, 0]));
        assert!(!m.is_feasible(&[0, 1]), "2000m does not fit in 1000m");
        assert!(!m.is_feasible(&[1]), "every item must be assigned");
        assert!(!m.is_feasible(&[1, 7]), "bin index out of range");
    }

    #[test]
    fn evaluate_reports_idle_totals() {
        let solution = model().evaluate(&[1, 0]).unwrap();
        assert_eq!(solution.idle_cpu, 1500);
        assert_eq!(solution.idle_memory, 1280);
        assert_eq!(solution.objective, 1500);
        assert!(solution.is_assigned(1, 0));
        assert!(!solution.is_assigned(0, 0));
    }

    #[test]
    fn joint_objective_sums_dimensions() {
        let joint = Objective::new(Sense::Minimize, true, true);
        assert_eq!(joint.value(1500, 1280), 2780);
        assert!(joint.improves(10, 11));
        assert!(!joint.improves(11, 11));
    }

    #[test]
    fn maximize_prefers_larger_values() {
        let max = Objective::new(Sense::Maximize, false, true);
        assert_eq!(max.value(1500, 1280), 1280);
        assert!(max.improves(12, 11));
        assert!(!max.improves(10, 11));
    }
}
