//! Hand-landmark gesture recognition.
//!
//! Frames from a pose source go through [`engine::GestureEngine::classify`], which returns a
//! debounced [`gestures::GestureEvent`] per frame.

pub mod config;
pub mod debounce;
pub mod engine;
pub mod fingers;
pub mod frame;
pub mod geometry;
pub mod gestures;
pub mod input;
pub mod tracker;
