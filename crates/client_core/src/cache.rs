//! Immutable snapshot of what the client believes the server holds.
//!
//! Every change produces a new [`TodoCache`]; readers holding an
//! `Arc<TodoCache>` never observe a half-applied update.

use std::collections::BTreeMap;

use serde_json::Value;
use shared::domain::{Todo, TodoId, TodoOrder};

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoCache {
    todos: BTreeMap<TodoId, Todo>,
    order: TodoOrder,
}

impl TodoCache {
    pub fn new(todos: Vec<Todo>, order: TodoOrder) -> Result<Self, ClientError> {
        let count = todos.len();
        let todos: BTreeMap<TodoId, Todo> = todos.into_iter().map(|todo| (todo.id, todo)).collect();
        if todos.len() != count {
            return Err(ClientError::InvalidShape("duplicate todo ids".into()));
        }
        if !order.is_permutation_of(todos.keys()) {
            return Err(ClientError::InvalidShape(
                "order does not list every todo exactly once".into(),
            ));
        }
        Ok(Self { todos, order })
    }

    /// Validates a raw `{ "todos": [...], "order": [...] }` payload.
    pub fn from_payload(payload: Value) -> Result<Self, ClientError> {
        let Value::Object(mut fields) = payload else {
            return Err(ClientError::InvalidShape(
                "expected an object with `todos` and `order`".into(),
            ));
        };
        let todos = take_list(&mut fields, "todos")?;
        let order = take_list(&mut fields, "order")?;

        let todos: Vec<Todo> = serde_json::from_value(todos)
            .map_err(|e| ClientError::InvalidShape(format!("`todos`: {e}")))?;
        let order: TodoOrder = serde_json::from_value(order)
            .map_err(|e| ClientError::InvalidShape(format!("`order`: {e}")))?;
        Self::new(todos, order)
    }

    pub fn todo(&self, id: TodoId) -> Option<&Todo> {
        self.todos.get(&id)
    }

    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    pub fn order(&self) -> &TodoOrder {
        &self.order
    }

    /// Todos in display order.
    pub fn ordered_todos(&self) -> Vec<&Todo> {
        self.order
            .ids()
            .iter()
            .filter_map(|id| self.todos.get(id))
            .collect()
    }

    pub fn accepts_order(&self, order: &TodoOrder) -> bool {
        order.is_permutation_of(self.todos.keys())
    }

    /// Copy with `done` patched on one todo. Unknown ids leave the copy identical.
    pub fn with_done(&self, id: TodoId, done: bool) -> Self {
        let mut next = self.clone();
        if let Some(todo) = next.todos.get_mut(&id) {
            todo.done = done;
        }
        next
    }

    /// Copy with the server's version of one todo swapped in.
    pub fn with_todo(&self, todo: Todo) -> Self {
        let mut next = self.clone();
        if let Some(slot) = next.todos.get_mut(&todo.id) {
            *slot = todo;
        }
        next
    }

    pub fn with_order(&self, order: TodoOrder) -> Result<Self, ClientError> {
        if !self.accepts_order(&order) {
            return Err(ClientError::InvalidOrder);
        }
        Ok(Self {
            todos: self.todos.clone(),
            order,
        })
    }
}

fn take_list(
    fields: &mut serde_json::Map<String, Value>,
    key: &str,
) -> Result<Value, ClientError> {
    match fields.remove(key) {
        Some(list @ Value::Array(_)) => Ok(list),
        Some(_) => Err(ClientError::InvalidShape(format!("`{key}` must be a list"))),
        None => Err(ClientError::InvalidShape(format!("`{key}` is missing"))),
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
