use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(TodoId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    pub body: String,
    pub done: bool,
    #[serde(default)]
    pub image_url: String,
}

impl Todo {
    pub fn with_done(&self, done: bool) -> Self {
        Self {
            done,
            ..self.clone()
        }
    }
}

/// Display order of the todo list. Serialized as a bare array of ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoOrder(pub Vec<TodoId>);

impl TodoOrder {
    pub fn new(ids: impl IntoIterator<Item = TodoId>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn ids(&self) -> &[TodoId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every id in `ids` appears exactly once and nothing else does.
    pub fn is_permutation_of<'a>(&self, ids: impl IntoIterator<Item = &'a TodoId>) -> bool {
        let expected: HashSet<TodoId> = ids.into_iter().copied().collect();
        if expected.len() != self.0.len() {
            return false;
        }
        let mut seen = HashSet::with_capacity(self.0.len());
        self.0
            .iter()
            .all(|id| expected.contains(id) && seen.insert(*id))
    }
}

impl From<Vec<i64>> for TodoOrder {
    fn from(value: Vec<i64>) -> Self {
        Self(value.into_iter().map(TodoId).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Order,
    TodoDone,
}

/// Unit of independent mutation tracking on both sides of the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Order,
    Done(TodoId),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Order => ResourceKind::Order,
            Resource::Done(_) => ResourceKind::TodoDone,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Order => f.write_str("order"),
            Resource::Done(id) => write!(f, "todo:{id}:done"),
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
