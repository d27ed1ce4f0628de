use shared::{
    domain::{Todo, TodoId, TodoOrder},
    error::{ApiError, ErrorCode},
    protocol::TodosResponse,
};

/// Authoritative in-memory todo list and display order.
#[derive(Debug, Clone)]
pub struct TodoStore {
    todos: Vec<Todo>,
    order: TodoOrder,
}

impl TodoStore {
    pub fn seeded() -> Self {
        let todos: Vec<Todo> = SEED_TODOS
            .iter()
            .enumerate()
            .map(|(index, (title, body))| Todo {
                id: TodoId(index as i64 + 1),
                title: (*title).to_string(),
                body: (*body).to_string(),
                done: false,
                image_url: String::new(),
            })
            .collect();
        let order = TodoOrder::new(todos.iter().map(|todo| todo.id));
        Self { todos, order }
    }

    pub fn snapshot(&self) -> TodosResponse {
        TodosResponse {
            todos: self.todos.clone(),
            order: self.order.clone(),
        }
    }

    pub fn order(&self) -> &TodoOrder {
        &self.order
    }

    pub fn set_order(&mut self, order: TodoOrder) -> Result<(), ApiError> {
        if !order.is_permutation_of(self.todos.iter().map(|todo| &todo.id)) {
            return Err(ApiError::new(
                ErrorCode::Validation,
                "order must list every todo id exactly once",
            ));
        }
        self.order = order;
        Ok(())
    }

    /// Returns the todo as written, or `None` when the id is unknown.
    pub fn set_done(&mut self, id: TodoId, done: bool) -> Option<Todo> {
        let todo = self.todos.iter_mut().find(|todo| todo.id == id)?;
        todo.done = done;
        Some(todo.clone())
    }
}

const SEED_TODOS: [(&str, &str); 10] = [
    (
        "Wrangle Unicorns",
        "Find a mythical stable, procure glitter, and practice ethical unicorn handling.",
    ),
    (
        "Organize Sock Drawer",
        "Match socks based on existential compatibility and color, not just size.",
    ),
    (
        "Build Time Machine",
        "Acquire flux capacitor, avoid paradoxes, and make sure to return before dinner.",
    ),
    (
        "Train for Space Mission",
        "Prepare for zero gravity, pack snacks, and memorize the entire user manual for the spaceship.",
    ),
    (
        "Learn Dolphin Language",
        "Watch 'Flipper' reruns, practice underwater breathing, and perfect your squeaks and clicks.",
    ),
    (
        "Become a Ninja",
        "Buy black pajamas, take stealth classes, and master the art of disappearing into thin air.",
    ),
    (
        "Bake a Cake for Dragons",
        "Research fireproof frosting, ensure cake is big enough, and avoid becoming the dessert.",
    ),
    (
        "Host a Ghost Party",
        "Send spooky invites, prepare ectoplasmic appetizers, and avoid any exorcisms.",
    ),
    (
        "Invent Self-Walking Shoes",
        "Combine shoes with tiny motors, ensure they know where they're going, and avoid walking off cliffs.",
    ),
    (
        "Write a Novel in Emoji",
        "Translate classic literature into emojis, capture all emotions, and make sure it's \u{1F60E}\u{1F44C}.",
    ),
];

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
