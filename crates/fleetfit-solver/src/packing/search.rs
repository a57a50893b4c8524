//! Depth-first branch-and-bound that fills one bin at a time.
//!
//! Bins and items are both ordered largest first, where size is measured
//! against the fleet total on whichever dimension the thing uses most of.
//! Identical bins end up next to each other. The current bin is completed
//! with items taken in increasing order, then closed, and the search moves
//! on to the next bin. A branch is cut when:
//! - the capacity left idle in closed bins exceeds the slack between total
//!   capacity and total demand on either dimension,
//! - the remaining items that can only go into some set of bins demand more
//!   than that set offers (a Hall-type bound over bin classes),
//! - the bin is a copy of its predecessor and would start with an earlier
//!   item, or all bins from here on are copies and it skips the smallest
//!   open item,
//! - the item is identical to one already tried at the same choice point.
//!
//! Every complete packing reaches the objective bound, so a best-fit
//! decreasing pass is tried first and the search only runs when it strands
//! an item. The search is exhaustive, so a missing solution is a proof of
//! infeasibility.

use std::cmp::Reverse;
use std::time::Instant;

use serde::Serialize;

use super::model::{Bin, Item, PackingModel, Solution};
use super::stats::SearchStatistics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchResult {
    Optimal(Solution),
    Infeasible,
}

/// Result of a search together with its statistics.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    result: SearchResult,
    statistics: SearchStatistics,
}

impl SearchOutcome {
    pub fn result(&self) -> &SearchResult {
        &self.result
    }

    pub fn statistics(&self) -> &SearchStatistics {
        &self.statistics
    }

    pub fn into_result(self) -> SearchResult {
        self.result
    }
}

/// Exact solver for [`PackingModel`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchAndBound;

impl BranchAndBound {
    pub fn new() -> Self {
        Self
    }

    pub fn solve(&self, model: &PackingModel) -> SearchOutcome {
        let start = Instant::now();
        let mut search = Search::new(model);
        let result = search.run();
        search.stats.set_total_time(start.elapsed());
        SearchOutcome {
            result,
            statistics: search.stats,
        }
    }
}

/// Class masks are `u64`; past this many classes only per-item fit is checked.
const MAX_EXACT_CLASSES: usize = 64;

/// Size of a bin or item relative to the fleet, on its dominant dimension.
///
/// Compares `cpu / total_cpu` against `memory / total_memory` without
/// dividing.
fn weight(cpu: u64, memory: u64, total_cpu: u64, total_memory: u64) -> u128 {
    let cpu = u128::from(cpu) * u128::from(total_memory);
    let memory = u128::from(memory) * u128::from(total_cpu);
    cpu.max(memory)
}

fn fits(item: Item, free: Bin) -> bool {
    item.cpu <= free.cpu && item.memory <= free.memory
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opened {
    /// Not opened yet on the current path.
    No,
    /// Closed without taking an item.
    Empty,
    /// Opened by the item at this position.
    First(usize),
}

#[derive(Debug, Clone, Copy)]
enum Step {
    /// Looking for the next item to pack.
    Items,
    /// Returned from packing this item.
    Placed(usize),
    /// Every item was tried; closing the bin is left.
    Closing,
    /// Returned from the bins after this one.
    Closed,
}

/// One open choice point: the bin being filled and where to resume.
#[derive(Debug, Clone, Copy)]
struct Frame {
    bin: usize,
    /// Next item position to consider for this bin.
    cursor: usize,
    /// When set, the bin may only be opened by this item.
    only: Option<usize>,
    /// Demand of the last item tried here.
    tried: Option<Item>,
    step: Step,
}

enum Entry {
    Open(Frame),
    Leaf,
    Pruned,
}

/// Bins sharing one capacity, as seen by the Hall-type bound.
#[derive(Debug, Clone, Copy)]
struct Class {
    fit: Bin,
    cpu: u64,
    memory: u64,
}

/// Remaining items with the same candidate classes.
#[derive(Debug, Clone, Copy)]
struct Group {
    mask: u64,
    cpu: u64,
    memory: u64,
}

struct Search<'a> {
    model: &'a PackingModel,
    /// Item indices in branching order.
    order: Vec<usize>,
    /// Demand per position in `order`.
    items: Vec<Item>,
    /// Bin indices in filling order.
    bin_order: Vec<usize>,
    /// Capacity per position in `bin_order`.
    bins: Vec<Bin>,
    /// One past the last bin identical to bin `b`.
    run_end: Vec<usize>,
    /// Capacity left per bin position.
    remaining: Vec<Bin>,
    /// Bin position per item position.
    placed: Vec<Option<usize>>,
    opened: Vec<Opened>,
    packed: usize,
    /// Capacity left in closed bins.
    waste: Bin,
    /// Total capacity minus total demand.
    slack: Bin,
    classes: Vec<Class>,
    groups: Vec<Group>,
    stats: SearchStatistics,
}

impl<'a> Search<'a> {
    fn new(model: &'a PackingModel) -> Self {
        let (total_cpu, total_memory) = model.capacity_totals();
        let size = |cpu, memory| Reverse(weight(cpu, memory, total_cpu, total_memory));

        let model_items = model.items();
        let mut order: Vec<usize> = (0..model_items.len()).collect();
        order.sort_by_key(|&j| {
            let item = model_items[j];
            (size(item.cpu, item.memory), Reverse(item.cpu), Reverse(item.memory))
        });
        let items: Vec<Item> = order.iter().map(|&j| model_items[j]).collect();

        let model_bins = model.bins();
        let mut bin_order: Vec<usize> = (0..model_bins.len()).collect();
        bin_order.sort_by_key(|&b| {
            let bin = model_bins[b];
            (size(bin.cpu, bin.memory), Reverse(bin.cpu), Reverse(bin.memory))
        });
        let bins: Vec<Bin> = bin_order.iter().map(|&b| model_bins[b]).collect();

        let mut run_end = vec![0; bins.len()];
        for b in (0..bins.len()).rev() {
            run_end[b] = if b + 1 < bins.len() && bins[b + 1] == bins[b] {
                run_end[b + 1]
            } else {
                b + 1
            };
        }

        let zero = Bin { cpu: 0, memory: 0 };
        Self {
            model,
            placed: vec![None; items.len()],
            opened: vec![Opened::No; bins.len()],
            remaining: bins.clone(),
            order,
            items,
            bin_order,
            bins,
            run_end,
            packed: 0,
            waste: zero,
            slack: zero,
            classes: Vec::new(),
            groups: Vec::new(),
            stats: SearchStatistics::default(),
        }
    }

    fn run(&mut self) -> SearchResult {
        let model = self.model;
        let objective = model.objective();

        let (capacity_cpu, capacity_memory) = model.capacity_totals();
        let (demand_cpu, demand_memory) = model.demand_totals();
        if demand_cpu > capacity_cpu || demand_memory > capacity_memory {
            self.stats.on_pruning_capacity();
            return SearchResult::Infeasible;
        }
        self.slack = Bin {
            cpu: capacity_cpu - demand_cpu,
            memory: capacity_memory - demand_memory,
        };

        // Every complete assignment packs all items, so its idle totals are
        // always capacity minus demand: the bound is exact.
        let bound = objective.value(self.slack.cpu, self.slack.memory);

        if self.items.is_empty() {
            return match model.evaluate(&[]) {
                Some(solution) => SearchResult::Optimal(solution),
                None => SearchResult::Infeasible,
            };
        }
        if self.bins.is_empty() {
            return SearchResult::Infeasible;
        }
        // Any complete packing reaches the bound.
        if let Some(solution) = self.best_fit().and_then(|a| model.evaluate(&a)) {
            self.stats.on_solution_found();
            return SearchResult::Optimal(solution);
        }

        let mut best: Option<Solution> = None;
        let mut stack: Vec<Frame> = Vec::new();
        let mut pending = Some((0usize, 0usize));

        loop {
            if let Some((bin, cursor)) = pending.take() {
                match self.enter(bin, cursor) {
                    Entry::Open(frame) => stack.push(frame),
                    Entry::Pruned => {}
                    Entry::Leaf => {
                        self.stats.on_solution_found();
                        if let Some(solution) = model.evaluate(&self.assignment()) {
                            let better = best
                                .as_ref()
                                .is_none_or(|b| objective.improves(solution.objective, b.objective));
                            if better {
                                best = Some(solution);
                            }
                        }
                        if best
                            .as_ref()
                            .is_some_and(|b| !objective.improves(bound, b.objective))
                        {
                            break;
                        }
                    }
                }
                continue;
            }

            let Some(frame) = stack.last_mut() else {
                break;
            };
            let step = frame.step;
            match step {
                Step::Placed(item) => {
                    self.unplace(item, frame.bin);
                    frame.tried = Some(self.items[item]);
                    frame.step = Step::Items;
                }
                Step::Items => match self.next_item(frame) {
                    Some(item) => {
                        self.place(item, frame.bin);
                        frame.cursor = item + 1;
                        frame.step = Step::Placed(item);
                        pending = Some((frame.bin, item + 1));
                    }
                    None => frame.step = Step::Closing,
                },
                Step::Closing => {
                    if self.close(frame.bin) {
                        frame.step = Step::Closed;
                        pending = Some((frame.bin + 1, 0));
                    } else {
                        self.stats.on_backtrack();
                        stack.pop();
                    }
                }
                Step::Closed => {
                    self.reopen(frame.bin);
                    self.stats.on_backtrack();
                    stack.pop();
                }
            }
        }

        match best {
            Some(solution) => SearchResult::Optimal(solution),
            None => SearchResult::Infeasible,
        }
    }

    /// Visit a node: the bin at `bin` being filled from item `cursor` on.
    fn enter(&mut self, bin: usize, cursor: usize) -> Entry {
        self.stats.on_node_explored();
        let n = self.items.len();
        if self.packed == n {
            return Entry::Leaf;
        }
        if !self.hall_holds(bin, cursor) {
            self.stats.on_pruning_capacity();
            return Entry::Pruned;
        }

        let mut frame = Frame {
            bin,
            cursor,
            only: None,
            tried: None,
            step: Step::Items,
        };
        if self.opened[bin] == Opened::No {
            // Copies of one bin are filled in order of their first item,
            // empty copies last.
            if bin > 0 && self.bins[bin - 1] == self.bins[bin] {
                match self.opened[bin - 1] {
                    Opened::Empty => frame.cursor = n,
                    Opened::First(previous) => frame.cursor = frame.cursor.max(previous + 1),
                    Opened::No => {}
                }
            }
            // When every bin left is a copy, the smallest open item may as
            // well go into this one.
            if self.run_end[bin] == self.bins.len() {
                frame.only = self.placed.iter().position(Option::is_none);
            }
        }
        Entry::Open(frame)
    }

    /// The next item position worth packing into the frame's bin.
    fn next_item(&mut self, frame: &Frame) -> Option<usize> {
        let free = self.remaining[frame.bin];
        for pos in frame.cursor..self.items.len() {
            if self.placed[pos].is_some() {
                continue;
            }
            if frame.only.is_some_and(|only| only != pos) {
                self.stats.on_pruning_symmetry();
                return None;
            }
            let item = self.items[pos];
            if frame.tried == Some(item) {
                self.stats.on_pruning_symmetry();
                continue;
            }
            if !fits(item, free) {
                self.stats.on_pruning_infeasible();
                continue;
            }
            return Some(pos);
        }
        None
    }

    /// Close the bin and account its leftover as waste. False when the
    /// branch is dead.
    fn close(&mut self, bin: usize) -> bool {
        let free = self.remaining[bin];
        let waste_cpu = self.waste.cpu.saturating_add(free.cpu);
        let waste_memory = self.waste.memory.saturating_add(free.memory);
        if waste_cpu > self.slack.cpu || waste_memory > self.slack.memory {
            self.stats.on_pruning_capacity();
            return false;
        }
        // Items are still open, and nothing is left to hold them.
        if bin + 1 == self.bins.len() {
            return false;
        }
        if self.opened[bin] == Opened::No {
            if self.run_end[bin] == self.bins.len() {
                self.stats.on_pruning_symmetry();
                return false;
            }
            self.opened[bin] = Opened::Empty;
        }
        self.waste = Bin {
            cpu: waste_cpu,
            memory: waste_memory,
        };
        true
    }

    fn reopen(&mut self, bin: usize) {
        let free = self.remaining[bin];
        self.waste.cpu -= free.cpu;
        self.waste.memory -= free.memory;
        if self.opened[bin] == Opened::Empty {
            self.opened[bin] = Opened::No;
        }
    }

    fn place(&mut self, item: usize, bin: usize) {
        let demand = self.items[item];
        let slot = &mut self.remaining[bin];
        slot.cpu -= demand.cpu;
        slot.memory -= demand.memory;
        self.placed[item] = Some(bin);
        self.packed += 1;
        if self.opened[bin] == Opened::No {
            self.opened[bin] = Opened::First(item);
        }
        self.stats.on_depth_update(self.packed as u64);
    }

    fn unplace(&mut self, item: usize, bin: usize) {
        let demand = self.items[item];
        let slot = &mut self.remaining[bin];
        slot.cpu += demand.cpu;
        slot.memory += demand.memory;
        self.placed[item] = None;
        self.packed -= 1;
        if self.opened[bin] == Opened::First(item) {
            self.opened[bin] = Opened::No;
        }
    }

    /// Whether the open items can still be spread over the bin being filled
    /// and the bins after it.
    ///
    /// Candidate bins are grouped into classes: the bin being filled (only
    /// items from `cursor` on may still join it) and each run of identical
    /// bins after it. For every set of classes some group of items is
    /// confined to, the group's demand must fit the set's capacity.
    fn hall_holds(&mut self, bin: usize, cursor: usize) -> bool {
        let mut classes = std::mem::take(&mut self.classes);
        let mut groups = std::mem::take(&mut self.groups);
        classes.clear();
        groups.clear();

        let current = self.remaining[bin];
        classes.push(Class {
            fit: current,
            cpu: current.cpu,
            memory: current.memory,
        });
        let mut next = bin + 1;
        while next < self.bins.len() {
            let end = self.run_end[next];
            let copies = (end - next) as u64;
            let capacity = self.bins[next];
            classes.push(Class {
                fit: capacity,
                cpu: capacity.cpu.saturating_mul(copies),
                memory: capacity.memory.saturating_mul(copies),
            });
            next = end;
        }
        let exact = classes.len() <= MAX_EXACT_CLASSES;

        let mut holds = true;
        for (pos, &item) in self.items.iter().enumerate() {
            if self.placed[pos].is_some() {
                continue;
            }
            let mut mask = 0u64;
            for (c, class) in classes.iter().enumerate() {
                if (c == 0 && pos < cursor) || !fits(item, class.fit) {
                    continue;
                }
                if !exact {
                    mask = 1;
                    break;
                }
                mask |= 1 << c;
            }
            if mask == 0 {
                holds = false;
                break;
            }
            if !exact {
                continue;
            }
            match groups.iter_mut().find(|g| g.mask == mask) {
                Some(group) => {
                    group.cpu = group.cpu.saturating_add(item.cpu);
                    group.memory = group.memory.saturating_add(item.memory);
                }
                None => groups.push(Group {
                    mask,
                    cpu: item.cpu,
                    memory: item.memory,
                }),
            }
        }

        if holds && exact {
            holds = groups.iter().all(|outer| {
                let (cpu, memory) = groups
                    .iter()
                    .filter(|g| g.mask & !outer.mask == 0)
                    .fold((0u64, 0u64), |(c, m), g| {
                        (c.saturating_add(g.cpu), m.saturating_add(g.memory))
                    });
                let (cap_cpu, cap_memory) = classes
                    .iter()
                    .enumerate()
                    .filter(|&(c, _)| (outer.mask >> c) & 1 == 1)
                    .fold((0u64, 0u64), |(c, m), (_, class)| {
                        (c.saturating_add(class.cpu), m.saturating_add(class.memory))
                    });
                cpu <= cap_cpu && memory <= cap_memory
            });
        }

        self.classes = classes;
        self.groups = groups;
        holds
    }

    /// Best-fit decreasing in branching order: each item goes to the bin it
    /// leaves smallest, ties to the earlier bin. `None` once an item fits
    /// nowhere.
    fn best_fit(&self) -> Option<Vec<usize>> {
        let (total_cpu, total_memory) = self.model.capacity_totals();
        let mut free = self.bins.clone();
        let mut assignment = vec![0; self.items.len()];
        for (pos, &item) in self.items.iter().enumerate() {
            let bin = (0..free.len())
                .filter(|&b| fits(item, free[b]))
                .min_by_key(|&b| {
                    weight(
                        free[b].cpu - item.cpu,
                        free[b].memory - item.memory,
                        total_cpu,
                        total_memory,
                    )
                })?;
            free[bin].cpu -= item.cpu;
            free[bin].memory -= item.memory;
            assignment[self.order[pos]] = self.bin_order[bin];
        }
        Some(assignment)
    }

    /// Item → bin in model indices for the current (complete) packing.
    fn assignment(&self) -> Vec<usize> {
        let mut assignment = vec![0; self.items.len()];
        for (pos, bin) in self.placed.iter().enumerate() {
            if let Some(bin) = bin {
                assignment[self.order[pos]] = self.bin_order[*bin];
            }
        }
        assignment
    }
}
