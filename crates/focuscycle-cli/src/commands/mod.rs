pub mod breathe;
pub mod config;
pub mod remind;
pub mod run;
pub mod settings;
pub mod timer;
