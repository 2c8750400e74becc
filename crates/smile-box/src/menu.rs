//! Three-screen menu driven by three buttons.
//!
//! | screen | A          | B                   | C          | hold A / C | hold A+C |
//! |--------|------------|---------------------|------------|------------|----------|
//! | Home   | prev item  | open item           | next item  | -          | -        |
//! | Music  | prev track | play / pause        | next track | volume -/+ | Home     |
//! | Smile  | prev image | auto-advance on/off | next image | -          | Home     |
//!
//! The smile screen runs the player in priority mode. Idle power-off only
//! applies on the home screen.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use smile_player::controller::{PlaybackController, VOLUME_STEP};

use crate::slideshow::Slideshow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    A,
    B,
    C,
}

/// Debounced button input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonEvent {
    Click(Button),
    /// One repeat step of a long press.
    Hold(Button),
    /// A and C held together.
    HoldBoth,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Home,
    Music,
    Smile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HomeItem {
    Music,
    Smile,
}

impl HomeItem {
    fn other(self) -> Self {
        match self {
            HomeItem::Music => HomeItem::Smile,
            HomeItem::Smile => HomeItem::Music,
        }
    }
}

/// Something the front-end should show.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MenuEvent {
    Screen(Screen),
    HomeSelection(HomeItem),
    Volume(u8),
    Image(PathBuf),
    AutoAdvance(bool),
    PowerOff,
}

pub struct Menu {
    controller: PlaybackController,
    slideshow: Slideshow,
    screen: Screen,
    home_item: HomeItem,
    idle_power_off: Option<Duration>,
    last_input: Instant,
}

impl Menu {
    pub fn new(
        controller: PlaybackController,
        slideshow: Slideshow,
        idle_power_off: Option<Duration>,
        now: Instant,
    ) -> Self {
        Self {
            controller,
            slideshow,
            screen: Screen::Home,
            home_item: HomeItem::Music,
            idle_power_off,
            last_input: now,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn home_item(&self) -> HomeItem {
        self.home_item
    }

    pub fn handle(&mut self, event: ButtonEvent, now: Instant) -> Vec<MenuEvent> {
        self.last_input = now;
        match self.screen {
            Screen::Home => self.handle_home(event, now),
            Screen::Music => self.handle_music(event),
            Screen::Smile => self.handle_smile(event, now),
        }
    }

    /// Time-driven updates: slideshow auto-advance and idle power-off.
    pub fn tick(&mut self, now: Instant) -> Vec<MenuEvent> {
        match self.screen {
            Screen::Smile => self
                .slideshow
                .tick(now)
                .map(|p| vec![MenuEvent::Image(p.to_path_buf())])
                .unwrap_or_default(),
            Screen::Home => match self.idle_power_off {
                Some(limit) if now.duration_since(self.last_input) >= limit => {
                    tracing::info!(idle_secs = limit.as_secs(), "idle on home screen, powering off");
                    vec![MenuEvent::PowerOff]
                }
                _ => Vec::new(),
            },
            Screen::Music => Vec::new(),
        }
    }

    fn handle_home(&mut self, event: ButtonEvent, now: Instant) -> Vec<MenuEvent> {
        match event {
            ButtonEvent::Click(Button::A) | ButtonEvent::Click(Button::C) => {
                self.home_item = self.home_item.other();
                vec![MenuEvent::HomeSelection(self.home_item)]
            }
            ButtonEvent::Click(Button::B) => match self.home_item {
                HomeItem::Music => {
                    self.controller.exit_priority_mode();
                    self.controller.toggle_running(false);
                    self.screen = Screen::Music;
                    vec![MenuEvent::Screen(Screen::Music)]
                }
                HomeItem::Smile => {
                    self.controller.enter_priority_mode();
                    self.slideshow.restart(now);
                    self.screen = Screen::Smile;
                    let mut events = vec![MenuEvent::Screen(Screen::Smile)];
                    if let Some(image) = self.slideshow.current() {
                        events.push(MenuEvent::Image(image.to_path_buf()));
                    }
                    events
                }
            },
            _ => Vec::new(),
        }
    }

    fn handle_music(&mut self, event: ButtonEvent) -> Vec<MenuEvent> {
        match event {
            ButtonEvent::Click(Button::B) => {
                let running = !self.controller.is_running();
                self.controller.toggle_running(running);
                Vec::new()
            }
            ButtonEvent::Click(Button::C) => {
                self.controller.request_next();
                Vec::new()
            }
            ButtonEvent::Click(Button::A) => {
                self.controller.request_previous();
                Vec::new()
            }
            ButtonEvent::Hold(Button::C) => {
                vec![MenuEvent::Volume(self.controller.adjust_volume(VOLUME_STEP))]
            }
            ButtonEvent::Hold(Button::A) => {
                vec![MenuEvent::Volume(self.controller.adjust_volume(-VOLUME_STEP))]
            }
            ButtonEvent::HoldBoth => {
                self.controller.toggle_running(false);
                self.go_home()
            }
            ButtonEvent::Hold(Button::B) => Vec::new(),
        }
    }

    fn handle_smile(&mut self, event: ButtonEvent, now: Instant) -> Vec<MenuEvent> {
        match event {
            ButtonEvent::Click(Button::A) => self
                .slideshow
                .previous(now)
                .map(|p| vec![MenuEvent::Image(p.to_path_buf())])
                .unwrap_or_default(),
            ButtonEvent::Click(Button::C) => self
                .slideshow
                .next(now)
                .map(|p| vec![MenuEvent::Image(p.to_path_buf())])
                .unwrap_or_default(),
            ButtonEvent::Click(Button::B) => {
                vec![MenuEvent::AutoAdvance(self.slideshow.toggle_auto_advance(now))]
            }
            ButtonEvent::HoldBoth => {
                self.controller.exit_priority_mode();
                self.go_home()
            }
            ButtonEvent::Hold(_) => Vec::new(),
        }
    }

    fn go_home(&mut self) -> Vec<MenuEvent> {
        self.screen = Screen::Home;
        vec![MenuEvent::Screen(Screen::Home)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use smile_player::catalog::{Playlist, Track, TrackCatalog};
    use smile_player::control::ControlState;
    use smile_player::engine::PlayerContext;
    use smile_player::settings::{MemorySettingsStore, PersistedSettings};

    struct Harness {
        menu: Menu,
        ctx: PlayerContext,
        start: Instant,
    }

    fn harness(tracks: usize, images: usize, idle: Option<Duration>) -> Harness {
        let catalog = TrackCatalog::from_tracks(
            (0..tracks)
                .map(|i| Track {
                    name: format!("t{i}.wav"),
                    path: PathBuf::from(format!("/music/t{i}.wav")),
                })
                .collect(),
        );
        let settings = Arc::new(PersistedSettings::load(Arc::new(
            MemorySettingsStore::default(),
        )));
        let playlist = Arc::new(Playlist::new(catalog, settings));
        let ctx = PlayerContext::new(ControlState::shared(100), playlist, "/smile.wav");
        let slideshow = Slideshow::new(
            (0..images)
                .map(|i| PathBuf::from(format!("{i}.png")))
                .collect(),
            Duration::from_secs(10),
        );
        let start = Instant::now();
        let menu = Menu::new(PlaybackController::new(ctx.clone()), slideshow, idle, start);
        Harness { menu, ctx, start }
    }

    fn click(b: Button) -> ButtonEvent {
        ButtonEvent::Click(b)
    }

    #[test]
    fn home_items_cycle_and_open_music() {
        let mut h = harness(2, 0, None);
        let now = h.start;
        assert_eq!(
            h.menu.handle(click(Button::C), now),
            vec![MenuEvent::HomeSelection(HomeItem::Smile)]
        );
        assert_eq!(
            h.menu.handle(click(Button::A), now),
            vec![MenuEvent::HomeSelection(HomeItem::Music)]
        );
        h.ctx.control.set_priority_active(true);
        assert_eq!(
            h.menu.handle(click(Button::B), now),
            vec![MenuEvent::Screen(Screen::Music)]
        );
        assert!(!h.ctx.control.priority_active());
        assert!(!h.ctx.control.running());
    }

    #[test]
    fn music_screen_controls_playback() {
        let mut h = harness(3, 0, None);
        let now = h.start;
        h.menu.handle(click(Button::B), now);

        h.menu.handle(click(Button::B), now);
        assert!(h.ctx.control.running());
        h.menu.handle(click(Button::C), now);
        assert_eq!(h.ctx.playlist.index(), 1);
        h.menu.handle(click(Button::A), now);
        h.menu.handle(click(Button::A), now);
        assert_eq!(h.ctx.playlist.index(), 2);

        h.menu.handle(click(Button::B), now);
        assert!(!h.ctx.control.running());
    }

    #[test]
    fn music_holds_step_volume() {
        let mut h = harness(1, 0, None);
        let now = h.start;
        h.menu.handle(click(Button::B), now);
        assert_eq!(
            h.menu.handle(ButtonEvent::Hold(Button::C), now),
            vec![MenuEvent::Volume(105)]
        );
        h.menu.handle(ButtonEvent::Hold(Button::A), now);
        assert_eq!(
            h.menu.handle(ButtonEvent::Hold(Button::A), now),
            vec![MenuEvent::Volume(95)]
        );
        assert_eq!(h.ctx.control.volume(), 95);
    }

    #[test]
    fn back_from_music_pauses() {
        let mut h = harness(1, 0, None);
        let now = h.start;
        h.menu.handle(click(Button::B), now);
        h.menu.handle(click(Button::B), now);
        assert!(h.ctx.control.running());
        assert_eq!(
            h.menu.handle(ButtonEvent::HoldBoth, now),
            vec![MenuEvent::Screen(Screen::Home)]
        );
        assert!(!h.ctx.control.running());
        assert_eq!(h.menu.screen(), Screen::Home);
    }

    #[test]
    fn smile_screen_runs_priority_mode() {
        let mut h = harness(1, 3, None);
        let now = h.start;
        h.menu.handle(click(Button::C), now);
        assert_eq!(
            h.menu.handle(click(Button::B), now),
            vec![
                MenuEvent::Screen(Screen::Smile),
                MenuEvent::Image(PathBuf::from("0.png")),
            ]
        );
        assert!(h.ctx.control.priority_active());

        assert_eq!(
            h.menu.handle(click(Button::A), now),
            vec![MenuEvent::Image(PathBuf::from("2.png"))]
        );
        assert_eq!(
            h.menu.handle(click(Button::B), now),
            vec![MenuEvent::AutoAdvance(false)]
        );

        h.menu.handle(ButtonEvent::HoldBoth, now);
        assert!(!h.ctx.control.priority_active());
        assert_eq!(h.menu.screen(), Screen::Home);
    }

    #[test]
    fn smile_slideshow_auto_advances() {
        let mut h = harness(1, 2, None);
        let now = h.start;
        h.menu.handle(click(Button::C), now);
        h.menu.handle(click(Button::B), now);
        assert!(h.menu.tick(now + Duration::from_secs(5)).is_empty());
        assert_eq!(
            h.menu.tick(now + Duration::from_secs(10)),
            vec![MenuEvent::Image(PathBuf::from("1.png"))]
        );
    }

    #[test]
    fn idle_power_off_only_on_home() {
        let mut h = harness(1, 0, Some(Duration::from_secs(10)));
        let start = h.start;
        assert!(h.menu.tick(start + Duration::from_secs(9)).is_empty());

        h.menu.handle(click(Button::B), start + Duration::from_secs(9));
        assert!(h.menu.tick(start + Duration::from_secs(60)).is_empty());

        h.menu
            .handle(ButtonEvent::HoldBoth, start + Duration::from_secs(60));
        assert!(h.menu.tick(start + Duration::from_secs(65)).is_empty());
        assert_eq!(
            h.menu.tick(start + Duration::from_secs(70)),
            vec![MenuEvent::PowerOff]
        );
    }

    #[test]
    fn idle_power_off_can_be_disabled() {
        let mut h = harness(1, 0, None);
        assert!(h.menu.tick(h.start + Duration::from_secs(3600)).is_empty());
    }
}
