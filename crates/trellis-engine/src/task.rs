//! Named tasks with ordering edges.
//!
//! Wiring is two phase: every key is declared before any edge is added, so
//! an edge to an unknown key is always a mistake and is rejected.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskKey(String);

impl TaskKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskNode {
    pub key: TaskKey,
    pub description: String,
    /// Tasks that must run first, in the order they were added.
    pub depends_on: Vec<TaskKey>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    index: HashMap<TaskKey, usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a task. Declaring an existing key keeps the first description.
    pub fn declare(&mut self, name: &str, description: &str) -> TaskKey {
        let key = TaskKey::new(name);
        if !self.index.contains_key(&key) {
            self.nodes.push(TaskNode {
                key: key.clone(),
                description: description.to_owned(),
                depends_on: Vec::new(),
            });
            self.index.insert(key.clone(), self.nodes.len() - 1);
        }
        key
    }

    /// Make `from` run after `on`. Repeated edges are ignored.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownTask` if either key is undeclared.
    pub fn depend(&mut self, from: &TaskKey, on: &TaskKey) -> Result<(), EngineError> {
        let unknown = || EngineError::UnknownTask {
            from: from.to_string(),
            to: on.to_string(),
        };
        if !self.index.contains_key(on) {
            return Err(unknown());
        }
        let node = self
            .index
            .get(from)
            .and_then(|i| self.nodes.get_mut(*i))
            .ok_or_else(unknown)?;
        if !node.depends_on.contains(on) {
            node.depends_on.push(on.clone());
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&TaskKey::new(name))
    }

    pub fn get(&self, name: &str) -> Option<&TaskNode> {
        self.index
            .get(&TaskKey::new(name))
            .and_then(|i| self.nodes.get(*i))
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that the graph has no cycles.
    ///
    /// # Errors
    /// Returns `EngineError::TaskCycle` naming the first loop found.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut marks = HashMap::new();
        let mut order = Vec::new();
        for node in &self.nodes {
            self.visit(&node.key, &mut marks, &mut Vec::new(), &mut order)?;
        }
        Ok(())
    }

    /// `target` and everything it depends on, dependencies first.
    ///
    /// # Errors
    /// Returns an error if `target` is undeclared or a cycle is reachable.
    pub fn execution_order(&self, target: &str) -> Result<Vec<TaskKey>, EngineError> {
        let key = TaskKey::new(target);
        if !self.index.contains_key(&key) {
            return Err(EngineError::TaskNotFound {
                name: target.to_owned(),
            });
        }
        let mut marks = HashMap::new();
        let mut order = Vec::new();
        self.visit(&key, &mut marks, &mut Vec::new(), &mut order)?;
        Ok(order)
    }

    /// Post-order DFS with in-progress marking for cycle detection.
    fn visit(
        &self,
        key: &TaskKey,
        marks: &mut HashMap<TaskKey, Mark>,
        stack: &mut Vec<TaskKey>,
        order: &mut Vec<TaskKey>,
    ) -> Result<(), EngineError> {
        match marks.get(key) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = stack.iter().position(|k| k == key).unwrap_or(0);
                let mut cycle: Vec<String> = stack
                    .get(start..)
                    .unwrap_or(stack.as_slice())
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                cycle.push(key.to_string());
                return Err(EngineError::TaskCycle { cycle });
            }
            None => {}
        }

        marks.insert(key.clone(), Mark::InProgress);
        stack.push(key.clone());
        if let Some(node) = self.index.get(key).and_then(|i| self.nodes.get(*i)) {
            for dep in &node.depends_on {
                self.visit(dep, marks, stack, order)?;
            }
        }
        stack.pop();
        marks.insert(key.clone(), Mark::Done);
        order.push(key.clone());
        Ok(())
    }
}
