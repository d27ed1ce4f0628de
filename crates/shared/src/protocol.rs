use serde::{Deserialize, Serialize};

use crate::domain::{Todo, TodoOrder};

pub const TODOS_ROUTE: &str = "/todos";
pub const TODO_ROUTE: &str = "/todos/:id";
pub const TODOS_ORDER_ROUTE: &str = "/todos-order";

pub fn todo_path(id: crate::domain::TodoId) -> String {
    format!("/todos/{}", id.0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodosResponse {
    pub todos: Vec<Todo>,
    pub order: TodoOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderRequest {
    pub order: TodoOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderResponse {
    pub order: TodoOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDoneRequest {
    pub done: bool,
}
