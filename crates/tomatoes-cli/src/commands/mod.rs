pub mod background;
pub mod config;
pub mod progress;
pub mod settings;
pub mod timer;
