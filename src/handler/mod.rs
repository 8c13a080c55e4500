pub mod events;
pub mod health;
pub mod index;
pub mod status;
mod stream;
