//! Box runtime.
//!
//! Wires settings, catalog, engine and menu together, then runs the input
//! loop until quit, end of input, or idle power-off.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::RecvTimeoutError;
use smile_player::catalog::{Playlist, TrackCatalog};
use smile_player::control::ControlState;
use smile_player::controller::PlaybackController;
use smile_player::engine::{PlaybackEngine, PlayerContext};
use smile_player::output::CpalSink;
use smile_player::settings::{FileSettingsStore, PersistedSettings};

use crate::config::ResolvedConfig;
use crate::input::{self, InputCommand};
use crate::menu::{Menu, MenuEvent};
use crate::slideshow::Slideshow;
use crate::ui::ConsoleUi;

const INPUT_POLL: Duration = Duration::from_millis(100);

/// Print output devices to stdout.
pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    for info in smile_player::device::list_devices(&host)? {
        let marker = if info.is_default { " (default)" } else { "" };
        match info.rates {
            Some((min, max)) => println!("- {}{marker}  [{min}-{max} Hz]", info.name),
            None => println!("- {}{marker}", info.name),
        }
    }
    Ok(())
}

pub fn run(config: ResolvedConfig) -> Result<()> {
    let store = Arc::new(FileSettingsStore::new(&config.settings_path));
    let settings = Arc::new(PersistedSettings::load(store));
    let restored = settings.get();
    tracing::info!(
        volume = restored.volume,
        play_index = restored.play_index,
        restored = settings.restored(),
        "settings loaded"
    );

    let control = ControlState::shared(restored.volume);
    let catalog = load_catalog(&config.music_dir);
    let playlist = Arc::new(Playlist::new(catalog, settings));
    let ui = Arc::new(ConsoleUi);

    let ctx = PlayerContext::new(control.clone(), playlist, &config.priority_sound)
        .with_observer(ui.clone())
        .with_config(config.engine.clone());
    let controller = PlaybackController::new(ctx.clone());

    {
        let control = control.clone();
        let _ = ctrlc::set_handler(move || {
            control.request_shutdown();
            std::process::exit(130);
        });
    }

    if let Some(path) = config.startup_sound.as_deref() {
        play_startup_sound(&controller, &config, path);
    }

    let engine = {
        let device = config.device.clone();
        let output = config.output.clone();
        let volume = control.volume_handle();
        PlaybackEngine::spawn(ctx, move || {
            CpalSink::open(device.as_deref(), output, volume)
        })?
    };

    let slideshow = Slideshow::scan(&config.smile_dir, config.slideshow_interval);
    let mut menu = Menu::new(
        controller.clone(),
        slideshow,
        config.idle_power_off,
        Instant::now(),
    );
    ui.show(&MenuEvent::Screen(menu.screen()));
    ui.show(&MenuEvent::HomeSelection(menu.home_item()));

    let (tx, rx) = crossbeam_channel::unbounded();
    input::spawn_stdin_reader(tx)?;

    'main: loop {
        match rx.recv_timeout(INPUT_POLL) {
            Ok(InputCommand::Button(event)) => {
                for ev in menu.handle(event, Instant::now()) {
                    ui.show(&ev);
                }
            }
            Ok(InputCommand::Status) => match serde_json::to_string_pretty(&controller.status()) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::warn!("status encode failed: {e}"),
            },
            Ok(InputCommand::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        for ev in menu.tick(Instant::now()) {
            ui.show(&ev);
            if ev == MenuEvent::PowerOff {
                break 'main;
            }
        }
    }

    controller.shutdown();
    engine.shutdown();
    tracing::info!("bye");
    Ok(())
}

fn load_catalog(dir: &Path) -> TrackCatalog {
    match TrackCatalog::scan(dir) {
        Ok(catalog) => {
            tracing::info!(dir = %dir.display(), tracks = catalog.len(), "music catalog loaded");
            catalog
        }
        Err(e) => {
            tracing::warn!("music catalog unavailable: {e:#}");
            TrackCatalog::default()
        }
    }
}

/// Play the startup sound on its own output, before the engine owns the device.
fn play_startup_sound(controller: &PlaybackController, config: &ResolvedConfig, path: &Path) {
    let volume = controller.context().control.volume_handle();
    let result = CpalSink::open(config.device.as_deref(), config.output.clone(), volume)
        .and_then(|mut sink| controller.play_file_now(path, &mut sink));
    match result {
        Ok(reason) => tracing::debug!(?reason, "startup sound done"),
        Err(e) => tracing::warn!("startup sound skipped: {e:#}"),
    }
}
