//! Smile Box: a button-driven WAV player with a "smile" slideshow mode.
//!
//! Tracks are streamed from a music directory through `smile-player`; three
//! buttons (read from stdin, one command per line) drive a small menu.
//!
//! - **Home**: choose between Play Music and Smile.
//! - **Music**: play/pause, previous/next, hold for volume.
//! - **Smile**: loops the priority sound over the slideshow.

mod cli;
mod config;
mod input;
mod menu;
mod runtime;
mod slideshow;
mod ui;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,smile_box=info,smile_player=info")
        }))
        .init();

    if args.list_devices {
        return runtime::list_devices();
    }

    let file = match args.config.as_deref() {
        Some(path) => config::BoxConfig::load(path)?,
        None => config::BoxConfig::default(),
    };
    runtime::run(config::resolve(&args, &file))
}
