//! Configuration loading and resolution.
//!
//! An optional TOML file provides defaults; command-line flags override it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use smile_player::config::{OutputConfig, PlayerConfig};

use crate::cli::Args;

/// Top-level config loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct BoxConfig {
    /// Directory scanned for tracks.
    pub music_dir: Option<String>,
    /// Sound looped in priority (smile) mode.
    pub priority_sound: Option<String>,
    /// Sound played once at startup.
    pub startup_sound: Option<String>,
    /// Settings record file.
    pub settings_path: Option<String>,
    /// Slideshow image directory.
    pub smile_dir: Option<String>,
    /// Output device substring.
    pub device: Option<String>,
    pub idle_power_off_secs: Option<u64>,
    pub slideshow_interval_secs: Option<u64>,
    pub engine: Option<EngineSection>,
    pub output: Option<OutputSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EngineSection {
    pub buffer_count: Option<usize>,
    pub buffer_capacity: Option<usize>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputSection {
    pub buffer_seconds: Option<f32>,
    pub refill_max_frames: Option<usize>,
    pub chunk_frames: Option<usize>,
}

impl BoxConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        toml::from_str::<BoxConfig>(&raw).with_context(|| format!("parse config {:?}", path))
    }
}

/// Fully resolved runtime settings.
#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    pub music_dir: PathBuf,
    pub priority_sound: PathBuf,
    /// `None` when the startup sound is disabled.
    pub startup_sound: Option<PathBuf>,
    pub settings_path: PathBuf,
    pub smile_dir: PathBuf,
    pub device: Option<String>,
    /// `None` disables idle power-off.
    pub idle_power_off: Option<Duration>,
    pub slideshow_interval: Duration,
    pub engine: PlayerConfig,
    pub output: OutputConfig,
}

const DEFAULT_MUSIC_DIR: &str = "music";
const DEFAULT_PRIORITY_SOUND: &str = "smile_sound.wav";
const DEFAULT_STARTUP_SOUND: &str = "startup.wav";
const DEFAULT_SETTINGS_PATH: &str = "smile-box.settings";
const DEFAULT_SMILE_DIR: &str = "smile";
const DEFAULT_IDLE_POWER_OFF_SECS: u64 = 10;
const DEFAULT_SLIDESHOW_INTERVAL_SECS: u64 = 10;

pub fn resolve(args: &Args, cfg: &BoxConfig) -> ResolvedConfig {
    let path = |arg: &Option<PathBuf>, file: &Option<String>, default: &str| {
        arg.clone()
            .or_else(|| non_empty(file.as_deref()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(default))
    };

    let startup_sound = (!args.no_startup_sound).then(|| {
        path(&args.startup_sound, &cfg.startup_sound, DEFAULT_STARTUP_SOUND)
    });

    let idle_secs = args
        .idle_power_off_secs
        .or(cfg.idle_power_off_secs)
        .unwrap_or(DEFAULT_IDLE_POWER_OFF_SECS);
    let slideshow_secs = cfg
        .slideshow_interval_secs
        .unwrap_or(DEFAULT_SLIDESHOW_INTERVAL_SECS)
        .max(1);

    ResolvedConfig {
        music_dir: path(&args.music_dir, &cfg.music_dir, DEFAULT_MUSIC_DIR),
        priority_sound: path(&args.priority_sound, &cfg.priority_sound, DEFAULT_PRIORITY_SOUND),
        startup_sound,
        settings_path: path(&args.settings_path, &cfg.settings_path, DEFAULT_SETTINGS_PATH),
        smile_dir: path(&args.smile_dir, &cfg.smile_dir, DEFAULT_SMILE_DIR),
        device: device_from_config(args.device.as_deref().or(cfg.device.as_deref())),
        idle_power_off: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
        slideshow_interval: Duration::from_secs(slideshow_secs),
        engine: engine_from_config(cfg.engine.as_ref()),
        output: output_from_config(cfg.output.as_ref()),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn device_from_config(device: Option<&str>) -> Option<String> {
    non_empty(device).map(str::to_string)
}

fn engine_from_config(section: Option<&EngineSection>) -> PlayerConfig {
    let mut config = PlayerConfig::default();
    if let Some(s) = section {
        if let Some(n) = s.buffer_count {
            config.buffer_count = n.max(1);
        }
        if let Some(n) = s.buffer_capacity {
            config.buffer_capacity = n.max(1);
        }
        if let Some(ms) = s.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms.max(1));
        }
    }
    config
}

fn output_from_config(section: Option<&OutputSection>) -> OutputConfig {
    let mut config = OutputConfig::default();
    if let Some(s) = section {
        if let Some(secs) = s.buffer_seconds {
            config.buffer_seconds = secs;
        }
        if let Some(n) = s.refill_max_frames {
            config.refill_max_frames = n.max(1);
        }
        if let Some(n) = s.chunk_frames {
            config.chunk_frames = n.max(1);
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file_or_flags() {
        let cfg = resolve(&Args::default(), &BoxConfig::default());
        assert_eq!(cfg.music_dir, PathBuf::from("music"));
        assert_eq!(cfg.startup_sound, Some(PathBuf::from("startup.wav")));
        assert_eq!(cfg.idle_power_off, Some(Duration::from_secs(10)));
        assert_eq!(cfg.slideshow_interval, Duration::from_secs(10));
        assert_eq!(cfg.engine.buffer_count, 3);
        assert_eq!(cfg.engine.buffer_capacity, 1024);
        assert!(cfg.device.is_none());
    }

    #[test]
    fn file_values_apply_and_flags_win() {
        let file: BoxConfig = toml::from_str(
            r#"
            music_dir = "/sd/music"
            priority_sound = "/sd/smile_sound.wav"
            device = "  USB DAC "
            idle_power_off_secs = 30

            [engine]
            buffer_capacity = 2048
            poll_interval_ms = 5

            [output]
            buffer_seconds = 0.5
            "#,
        )
        .unwrap();
        let args = Args {
            music_dir: Some(PathBuf::from("/override")),
            idle_power_off_secs: Some(0),
            ..Args::default()
        };

        let cfg = resolve(&args, &file);
        assert_eq!(cfg.music_dir, PathBuf::from("/override"));
        assert_eq!(cfg.priority_sound, PathBuf::from("/sd/smile_sound.wav"));
        assert_eq!(cfg.device.as_deref(), Some("USB DAC"));
        assert_eq!(cfg.idle_power_off, None);
        assert_eq!(cfg.engine.buffer_capacity, 2048);
        assert_eq!(cfg.engine.poll_interval, Duration::from_millis(5));
        assert_eq!(cfg.output.buffer_seconds, 0.5);
    }

    #[test]
    fn startup_sound_can_be_disabled() {
        let args = Args {
            no_startup_sound: true,
            ..Args::default()
        };
        assert!(resolve(&args, &BoxConfig::default()).startup_sound.is_none());
    }

    #[test]
    fn blank_strings_fall_back_to_defaults() {
        let file = BoxConfig {
            smile_dir: Some("   ".to_string()),
            device: Some("".to_string()),
            ..BoxConfig::default()
        };
        let cfg = resolve(&Args::default(), &file);
        assert_eq!(cfg.smile_dir, PathBuf::from("smile"));
        assert!(cfg.device.is_none());
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = std::env::temp_dir().join(format!(
            "smile-box-config-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "music_dir = [").unwrap();
        let err = BoxConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parse config"));
    }
}
