//! Input side of the vehicle.
//!
//! - `sampler`: analog channel sequencing on the shared converter
//! - `debounce`: rotary encoder and push-button events
//! - `speed`: speed-sensor period measurement

pub mod debounce;
pub mod sampler;
pub mod speed;

pub use debounce::{Debouncer, InputEvent, InputPins, InputSample};
pub use sampler::Sampler;
