//! Local-first outbox: domain models, storage contract, sync engine and client facade.

mod connectivity;
mod dispatch;
mod engine;
mod events;
mod facade;
mod model;
mod outbox;
mod scheduler;
mod store;

pub use connectivity::*;
pub use dispatch::*;
pub use engine::*;
pub use events::*;
pub use facade::*;
pub use model::*;
pub use outbox::*;
pub use scheduler::*;
pub use store::*;

#[cfg(test)]
mod test_utils;
