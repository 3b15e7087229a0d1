pub mod app;
pub mod counters;
pub mod input;
pub mod rate;
pub mod reconcile;
pub mod ui;
pub mod view;

pub use self::app::{App, Sampler, Settings, State, View, run};
