//! Types shared by the todo server and the reconciliation client.

pub mod domain;
pub mod error;
pub mod protocol;
