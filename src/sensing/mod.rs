pub mod controller;
pub mod loop_worker;
pub mod observer;
pub mod tracker;

pub use controller::SensingController;
pub use loop_worker::{handle_sample, SamplingContext};
pub use observer::{ActiveWindowObserver, ActivitySample, AppleScriptObserver};
pub use tracker::{focus_channel, FocusEvent, FocusHandle, FocusTarget, FocusTracker};
