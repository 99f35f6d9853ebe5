//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod counter_store;
pub mod message_bus;
pub mod post_repo;

pub use counter_store::CounterStore;
pub use message_bus::{
    Acknowledger, Delivery, DeliveryOutcome, Message, MessagePublisher, MessageSubscriber,
    PublishReceipt, Subscription, Verdict,
};
pub use post_repo::PostRepository;
