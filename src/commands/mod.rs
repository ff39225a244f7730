pub mod gmute;
pub mod gmutestat;
