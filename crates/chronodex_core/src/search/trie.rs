//! Prefix trie over task title words.
//!
//! # Responsibility
//! - Map every lowercased title word to the tasks whose title contains it.
//! - Answer prefix queries against any word of a title.
//!
//! # Invariants
//! - Nodes live in an arena; node 0 is the root.
//! - `owners[id]` lists exactly the terminal nodes holding `id`, so removal
//!   touches only the words the task inserted.
//! - A terminal node never lists the same id twice.
//! - Every non-root node either holds ids or has children; `remove` frees the
//!   rest into a slot list that later inserts reuse.

use crate::model::task::TaskId;
use std::collections::{BTreeMap, HashMap, HashSet};

const ROOT: usize = 0;

#[derive(Debug, Default)]
struct TrieNode {
    /// Parent slot and the edge character leading here. `None` for the root.
    parent: Option<(usize, char)>,
    children: BTreeMap<char, usize>,
    task_ids: Vec<TaskId>,
}

impl TrieNode {
    fn is_dead(&self) -> bool {
        self.children.is_empty() && self.task_ids.is_empty()
    }
}

/// Word-prefix search index.
#[derive(Debug)]
pub struct SearchTrie {
    nodes: Vec<TrieNode>,
    free: Vec<usize>,
    owners: HashMap<TaskId, Vec<usize>>,
}

impl Default for SearchTrie {
    fn default() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
            free: Vec::new(),
            owners: HashMap::new(),
        }
    }
}

impl SearchTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed tasks.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.owners.contains_key(&task_id)
    }

    /// Live arena nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Indexes every whitespace-separated word of `title` under `task_id`.
    pub fn insert(&mut self, title: &str, task_id: TaskId) {
        for word in normalize_words(title) {
            let mut cursor = ROOT;
            for ch in word.chars() {
                cursor = match self.nodes[cursor].children.get(&ch) {
                    Some(&child) => child,
                    None => self.alloc_child(cursor, ch),
                };
            }

            let terminal = &mut self.nodes[cursor];
            if !terminal.task_ids.contains(&task_id) {
                terminal.task_ids.push(task_id);
                self.owners.entry(task_id).or_default().push(cursor);
            }
        }
    }

    /// Purges `task_id` from every node it populated. Returns whether it was indexed.
    pub fn remove(&mut self, task_id: TaskId) -> bool {
        let Some(terminals) = self.owners.remove(&task_id) else {
            return false;
        };
        for node in terminals {
            self.nodes[node].task_ids.retain(|id| *id != task_id);
            self.prune_upward(node);
        }
        true
    }

    /// Replaces the indexed title of `task_id`.
    pub fn reindex(&mut self, title: &str, task_id: TaskId) {
        self.remove(task_id);
        self.insert(title, task_id);
    }

    /// Tasks with a title word starting with `prefix`, deduplicated, in trie order.
    pub fn search(&self, prefix: &str) -> Vec<TaskId> {
        let prefix = prefix.trim().to_lowercase();
        let mut cursor = ROOT;
        for ch in prefix.chars() {
            match self.nodes[cursor].children.get(&ch) {
                Some(&child) => cursor = child,
                None => return Vec::new(),
            }
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut stack = vec![cursor];
        while let Some(node) = stack.pop() {
            let node = &self.nodes[node];
            for id in &node.task_ids {
                if seen.insert(*id) {
                    found.push(*id);
                }
            }
            // Reverse push so children pop in character order.
            stack.extend(node.children.values().rev().copied());
        }
        found
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn alloc_child(&mut self, parent: usize, ch: char) -> usize {
        let node = TrieNode {
            parent: Some((parent, ch)),
            ..TrieNode::default()
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.nodes[parent].children.insert(ch, slot);
        slot
    }

    /// Frees `node` and its ancestors while they hold no ids and no children.
    fn prune_upward(&mut self, mut node: usize) {
        while node != ROOT && self.nodes[node].is_dead() {
            let Some((parent, ch)) = self.nodes[node].parent.take() else {
                break;
            };
            self.nodes[parent].children.remove(&ch);
            self.free.push(node);
            node = parent;
        }
    }
}

fn normalize_words(title: &str) -> impl Iterator<Item = String> + '_ {
    title.split_whitespace().map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::SearchTrie;
    use uuid::Uuid;

    #[test]
    fn prefix_matches_any_word() {
        let t1 = Uuid::new_v4();
        let mut trie = SearchTrie::new();
        trie.insert("Buy Milk", t1);

        assert_eq!(trie.search("mil"), vec![t1]);
        assert_eq!(trie.search("BU"), vec![t1]);
        assert!(trie.search("eggs").is_empty());
    }

    #[test]
    fn results_are_deduplicated_across_words() {
        let t1 = Uuid::new_v4();
        let mut trie = SearchTrie::new();
        trie.insert("milk milkshake MILK", t1);
        assert_eq!(trie.search("mil"), vec![t1]);
    }

    #[test]
    fn results_follow_character_order() {
        let apple = Uuid::new_v4();
        let apricot = Uuid::new_v4();
        let mut trie = SearchTrie::new();
        trie.insert("apricot jam", apricot);
        trie.insert("apple pie", apple);

        assert_eq!(trie.search("ap"), vec![apple, apricot]);
        assert_eq!(trie.search(""), vec![apple, apricot]);
    }

    #[test]
    fn remove_purges_stale_ids() {
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let mut trie = SearchTrie::new();
        trie.insert("Buy milk", t1);
        trie.insert("milk the cow", t2);

        assert!(trie.remove(t1));
        assert!(!trie.remove(t1));
        assert_eq!(trie.search("milk"), vec![t2]);
        assert!(trie.search("buy").is_empty());
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn reindex_replaces_old_title() {
        let t1 = Uuid::new_v4();
        let mut trie = SearchTrie::new();
        trie.insert("draft slides", t1);
        trie.reindex("final report", t1);

        assert!(trie.search("draft").is_empty());
        assert_eq!(trie.search("rep"), vec![t1]);
    }

    #[test]
    fn remove_frees_unshared_branches() {
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let mut trie = SearchTrie::new();
        trie.insert("milk", t1);
        // root + m-i-l-k
        assert_eq!(trie.node_count(), 5);

        trie.insert("milkshake mint", t2);
        assert_eq!(trie.node_count(), 12);

        assert!(trie.remove(t2));
        assert_eq!(trie.node_count(), 5);
        assert_eq!(trie.search("mi"), vec![t1]);

        assert!(trie.remove(t1));
        assert_eq!(trie.node_count(), 1);
        assert!(trie.is_empty());
    }

    #[test]
    fn freed_slots_are_reused_across_churn() {
        let mut trie = SearchTrie::new();
        for round in 0..50 {
            let id = Uuid::new_v4();
            trie.insert(&format!("weekly sync {round}"), id);
            assert_eq!(trie.search("week"), vec![id]);
            trie.remove(id);
        }
        assert_eq!(trie.node_count(), 1);
        assert!(trie.nodes.len() <= 16);
        assert!(trie.search("w").is_empty());
    }
}
