mod engine;

pub use engine::{format_remaining, TimerEngine, TimerHandle, TimerSignal, TimerState};
