mod engine;
mod settings;
mod state;

pub use engine::CycleEngine;
pub use settings::Settings;
pub use state::{CycleState, Phase};
