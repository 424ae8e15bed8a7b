//! Prerequisite graph over tasks.
//!
//! # Responsibility
//! - Hold prerequisite -> dependent edges with forward and reverse adjacency.
//! - Detect cycles, check completion eligibility, rank bottlenecks and
//!   produce a topological execution order.
//!
//! # Invariants
//! - Nodes live in an arena addressed by `usize` slots; `slots` maps ids to slots.
//! - `dependents[p]` contains `d` iff `prerequisites[d]` contains `p`.
//! - Reads tolerate unknown ids as nodes with no edges.
//! - The coordinator keeps the graph acyclic by running `detect_cycle`
//!   after every edge addition that could close a cycle.

use crate::model::task::TaskId;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone)]
struct Node {
    id: TaskId,
    dependents: Vec<usize>,
    prerequisites: Vec<usize>,
}

/// One bottleneck row: a task and everything it transitively blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bottleneck {
    pub task_id: TaskId,
    pub blocked_count: usize,
    /// Breadth-first order from the bottleneck.
    pub blocked_task_ids: Vec<TaskId>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Directed prerequisite graph.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    slots: HashMap<TaskId, usize>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    pub fn edge_count(&self) -> usize {
        self.live_nodes().map(|(_, node)| node.dependents.len()).sum()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Registers `id` as a node. Returns `true` when the node is new.
    pub fn add_task(&mut self, id: TaskId) -> bool {
        if self.slots.contains_key(&id) {
            return false;
        }
        let node = Node {
            id,
            dependents: Vec::new(),
            prerequisites: Vec::new(),
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.slots.insert(id, slot);
        true
    }

    /// Adds the edge `prerequisite -> dependent`, registering unseen endpoints.
    ///
    /// Returns `true` when the edge is new.
    pub fn add_dependency(&mut self, prerequisite: TaskId, dependent: TaskId) -> bool {
        self.add_task(prerequisite);
        self.add_task(dependent);
        let from = self.slots[&prerequisite];
        let to = self.slots[&dependent];
        if self.node(from).dependents.contains(&to) {
            return false;
        }
        self.node_mut(from).dependents.push(to);
        self.node_mut(to).prerequisites.push(from);
        true
    }

    /// Removes the edge `prerequisite -> dependent`. Returns whether it existed.
    pub fn remove_dependency(&mut self, prerequisite: TaskId, dependent: TaskId) -> bool {
        let (Some(&from), Some(&to)) = (self.slots.get(&prerequisite), self.slots.get(&dependent))
        else {
            return false;
        };
        let before = self.node(from).dependents.len();
        self.node_mut(from).dependents.retain(|slot| *slot != to);
        self.node_mut(to).prerequisites.retain(|slot| *slot != from);
        self.node(from).dependents.len() != before
    }

    /// Direct prerequisites of `id`, in insertion order.
    pub fn prerequisites(&self, id: TaskId) -> Vec<TaskId> {
        self.slots
            .get(&id)
            .map(|slot| self.ids(&self.node(*slot).prerequisites))
            .unwrap_or_default()
    }

    /// Direct dependents of `id`, in insertion order.
    pub fn dependents(&self, id: TaskId) -> Vec<TaskId> {
        self.slots
            .get(&id)
            .map(|slot| self.ids(&self.node(*slot).dependents))
            .unwrap_or_default()
    }

    /// Drops every prerequisite edge of `id`. Returns the prerequisites removed.
    pub fn clear_prerequisites(&mut self, id: TaskId) -> Vec<TaskId> {
        let prerequisites = self.prerequisites(id);
        for prerequisite in &prerequisites {
            self.remove_dependency(*prerequisite, id);
        }
        prerequisites
    }

    /// Removes `id`'s own prerequisite edges and, when nothing depends on it
    /// anymore, the node itself.
    ///
    /// A node that still has dependents stays as a placeholder carrying those
    /// edges, since the dependents' stored prerequisite lists still name it.
    /// Returns the former prerequisites so callers can prune stale placeholders.
    pub fn detach_task(&mut self, id: TaskId) -> Vec<TaskId> {
        let former = self.clear_prerequisites(id);
        self.prune_if_isolated(id);
        former
    }

    /// Removes `id` when it has no incident edges. Returns whether it was removed.
    pub fn prune_if_isolated(&mut self, id: TaskId) -> bool {
        let Some(&slot) = self.slots.get(&id) else {
            return false;
        };
        let node = self.node(slot);
        if !node.dependents.is_empty() || !node.prerequisites.is_empty() {
            return false;
        }
        self.nodes[slot] = None;
        self.free.push(slot);
        self.slots.remove(&id);
        true
    }

    /// Depth-first search for a back edge (a node already on the DFS stack).
    pub fn detect_cycle(&self) -> bool {
        self.cycle_member().is_some()
    }

    /// A task lying on some cycle, when one exists.
    pub fn cycle_member(&self) -> Option<TaskId> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        for (root, _) in self.live_nodes() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            // Explicit stack of (slot, next child index) keeps deep chains off the call stack.
            let mut stack = vec![(root, 0usize)];
            marks[root] = Mark::OnStack;
            while let Some((slot, child_index)) = stack.last_mut() {
                let dependents = &self.node(*slot).dependents;
                if let Some(&next) = dependents.get(*child_index) {
                    *child_index += 1;
                    match marks[next] {
                        Mark::OnStack => return Some(self.node(next).id),
                        Mark::Unvisited => {
                            marks[next] = Mark::OnStack;
                            stack.push((next, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[*slot] = Mark::Done;
                    stack.pop();
                }
            }
        }
        None
    }

    /// True iff every prerequisite of `id` is in `completed`.
    pub fn can_complete(&self, id: TaskId, completed: &HashSet<TaskId>) -> bool {
        self.missing_prerequisites(id, completed).is_empty()
    }

    /// Prerequisites of `id` that are not in `completed`.
    pub fn missing_prerequisites(&self, id: TaskId, completed: &HashSet<TaskId>) -> Vec<TaskId> {
        self.prerequisites(id)
            .into_iter()
            .filter(|prerequisite| !completed.contains(prerequisite))
            .collect()
    }

    /// Every task reachable from `id` through dependent edges, breadth-first.
    pub fn transitive_dependents(&self, id: TaskId) -> Vec<TaskId> {
        let Some(&start) = self.slots.get(&id) else {
            return Vec::new();
        };
        let mut seen = vec![false; self.nodes.len()];
        seen[start] = true;
        let mut queue = VecDeque::from(self.node(start).dependents.clone());
        let mut reached = Vec::new();
        while let Some(slot) = queue.pop_front() {
            if seen[slot] {
                continue;
            }
            seen[slot] = true;
            reached.push(self.node(slot).id);
            queue.extend(self.node(slot).dependents.iter().copied());
        }
        reached
    }

    /// Nodes with at least one dependent, ranked by transitive dependent count.
    ///
    /// Ties keep arena order.
    pub fn bottleneck_tasks(&self) -> Vec<Bottleneck> {
        let mut ranked = self
            .live_nodes()
            .filter(|(_, node)| !node.dependents.is_empty())
            .map(|(_, node)| {
                let blocked_task_ids = self.transitive_dependents(node.id);
                Bottleneck {
                    task_id: node.id,
                    blocked_count: blocked_task_ids.len(),
                    blocked_task_ids,
                }
            })
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.blocked_count.cmp(&a.blocked_count));
        ranked
    }

    /// Topological order (prerequisites before dependents) via reversed DFS post-order.
    pub fn resolve(&self) -> Vec<TaskId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut post_order = Vec::with_capacity(self.slots.len());
        for (root, _) in self.live_nodes() {
            if visited[root] {
                continue;
            }
            visited[root] = true;
            let mut stack = vec![(root, 0usize)];
            while let Some((slot, child_index)) = stack.last_mut() {
                let dependents = &self.node(*slot).dependents;
                if let Some(&next) = dependents.get(*child_index) {
                    *child_index += 1;
                    if !visited[next] {
                        visited[next] = true;
                        stack.push((next, 0));
                    }
                } else {
                    post_order.push(self.node(*slot).id);
                    stack.pop();
                }
            }
        }
        post_order.reverse();
        post_order
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.slots.clear();
    }

    fn live_nodes(&self) -> impl Iterator<Item = (usize, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(slot, node)| node.as_ref().map(|node| (slot, node)))
    }

    fn ids(&self, slots: &[usize]) -> Vec<TaskId> {
        slots.iter().map(|slot| self.node(*slot).id).collect()
    }

    // Slots reachable through `slots` or adjacency lists always hold a node.
    fn node(&self, slot: usize) -> &Node {
        self.nodes[slot]
            .as_ref()
            .unwrap_or_else(|| unreachable!("dangling graph slot {slot}"))
    }

    fn node_mut(&mut self, slot: usize) -> &mut Node {
        self.nodes[slot]
            .as_mut()
            .unwrap_or_else(|| unreachable!("dangling graph slot {slot}"))
    }
}
