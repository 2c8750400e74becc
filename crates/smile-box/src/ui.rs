//! Text rendering of the menu and player notifications.

use smile_player::observer::PlayerObserver;

use crate::menu::{HomeItem, MenuEvent, Screen};

#[derive(Debug, Default)]
pub struct ConsoleUi;

impl ConsoleUi {
    pub fn show(&self, event: &MenuEvent) {
        println!("{}", describe(event));
    }
}

impl PlayerObserver for ConsoleUi {
    fn track_changed(&self, name: &str) {
        println!("[music] now playing: {name}");
    }

    fn play_state_changed(&self, running: bool) {
        println!("[music] {}", if running { "playing" } else { "paused" });
    }
}

pub fn describe(event: &MenuEvent) -> String {
    match event {
        MenuEvent::Screen(Screen::Home) => "[home] a/c: choose, b: open".to_string(),
        MenuEvent::Screen(Screen::Music) => {
            "[music] b: play/pause, a/c: prev/next, -/+: volume, back: home".to_string()
        }
        MenuEvent::Screen(Screen::Smile) => {
            "[smile] a/c: prev/next image, b: auto-advance, back: home".to_string()
        }
        MenuEvent::HomeSelection(item) => format!(
            "[home] > {}",
            match item {
                HomeItem::Music => "Play Music",
                HomeItem::Smile => "Smile",
            }
        ),
        MenuEvent::Volume(v) => format!("[music] volume {}%", *v as u32 * 100 / 255),
        MenuEvent::Image(path) => format!("[smile] showing {}", path.display()),
        MenuEvent::AutoAdvance(on) => {
            format!("[smile] auto-advance {}", if *on { "on" } else { "off" })
        }
        MenuEvent::PowerOff => "powering off".to_string(),
    }
}
