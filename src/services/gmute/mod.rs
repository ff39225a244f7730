//! Global mutes: a registry of users muted in every guild the bot moderates.
//!
//! Orchestration in [`service`] only talks to the traits in [`api`] and
//! [`store`]. [`discord`] and [`store::PgGmuteStore`] are the production
//! implementations.

pub mod api;
pub mod discord;
pub mod export;
pub mod service;
pub mod store;

pub use api::{Broadcaster, ChatDirectory, FanOut, MemberStatus, ModerationApi, RemoteError};
pub use service::{
    Enforcement, FanOutReport, Gmute, GmuteOutcome, Rejection, Sighting, Target, UngmuteOutcome,
};
pub use store::{GmuteStore, PgGmuteStore};
