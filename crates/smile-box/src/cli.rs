use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(name = "smile-box", version)]
pub struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Directory scanned for `.wav` tracks
    #[arg(long)]
    pub music_dir: Option<PathBuf>,

    /// Sound looped while the smile screen is open
    #[arg(long)]
    pub priority_sound: Option<PathBuf>,

    /// Sound played once at startup
    #[arg(long)]
    pub startup_sound: Option<PathBuf>,

    /// Skip the startup sound
    #[arg(long)]
    pub no_startup_sound: bool,

    /// Where volume and last track are stored
    #[arg(long)]
    pub settings_path: Option<PathBuf>,

    /// Directory with slideshow images for the smile screen
    #[arg(long)]
    pub smile_dir: Option<PathBuf>,

    /// Exit after this many idle seconds on the home screen (0 disables)
    #[arg(long)]
    pub idle_power_off_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let args = Args::try_parse_from([
            "smile-box",
            "--music-dir",
            "/sd/music",
            "--no-startup-sound",
            "--idle-power-off-secs",
            "0",
        ])
        .unwrap();
        assert_eq!(args.music_dir, Some(PathBuf::from("/sd/music")));
        assert!(args.no_startup_sound);
        assert_eq!(args.idle_power_off_secs, Some(0));
        assert!(!args.list_devices);
    }
}
