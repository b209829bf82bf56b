pub mod destination;
pub mod event;
pub mod link;

pub use destination::Entity as DestinationEntity;
pub use event::Entity as EventEntity;
pub use link::Entity as LinkEntity;
