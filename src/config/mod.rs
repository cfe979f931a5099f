pub mod settings;

pub use settings::{BusSettings, ServerSettings, Settings};
