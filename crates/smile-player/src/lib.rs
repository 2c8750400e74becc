pub mod buffers;
pub mod catalog;
pub mod config;
pub mod control;
pub mod controller;
pub mod device;
pub mod engine;
pub mod error;
pub mod observer;
pub mod output;
pub mod queue;
pub mod resample;
pub mod settings;
pub mod sink;
pub mod status;
pub mod wav;

#[cfg(test)]
pub(crate) mod testutil;
