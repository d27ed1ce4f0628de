use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    hazard::{HazardPolicy, HazardSimulator},
    store::TodoStore,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<Mutex<TodoStore>>,
    pub(crate) hazards: Arc<HazardSimulator>,
}

impl AppState {
    pub(crate) fn new(store: TodoStore, policy: HazardPolicy) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            hazards: HazardSimulator::new(policy),
        }
    }
}
