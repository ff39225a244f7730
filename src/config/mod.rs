pub mod settings;

pub use settings::{Operators, Settings};
