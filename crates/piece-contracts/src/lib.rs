pub mod analysis;
pub mod events;
pub mod image;
pub mod links;
pub mod session;
