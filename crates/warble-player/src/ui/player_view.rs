//! Player controls: file picker, transport buttons and sliders
//!
//! Holds the values the widgets show. Slider values live here, not in the
//! session, so they survive between files and can be set before anything
//! is loaded.

use iced::widget::{button, column, container, row, slider, text, Space};
use iced::{Center, Element, Fill};

use warble_core::engine::PlayerParams;
use warble_core::session::Session;

use super::message::Message;

/// Pitch and tempo slider range (multiplier)
pub const SHIFT_RANGE: std::ops::RangeInclusive<f64> = 0.5..=2.0;

pub struct PlayerView {
    pub pitch: f64,
    pub tempo: f64,
    pub volume: f64,
    /// Seek slider value (0.0-1.0)
    pub seek: f64,
    /// True while the user drags the seek slider
    pub seeking: bool,
    pub elapsed: f64,
    pub duration: f64,
    pub playing: bool,
    pub loaded: bool,
    pub loading: bool,
    pub file_name: Option<String>,
}

impl PlayerView {
    pub fn new(params: PlayerParams) -> Self {
        Self {
            pitch: params.pitch,
            tempo: params.tempo,
            volume: params.volume,
            seek: 0.0,
            seeking: false,
            elapsed: 0.0,
            duration: 0.0,
            playing: false,
            loaded: false,
            loading: false,
            file_name: None,
        }
    }

    pub fn params(&self) -> PlayerParams {
        PlayerParams {
            pitch: self.pitch,
            tempo: self.tempo,
            volume: self.volume,
        }
    }

    /// Copy position and play state from the session
    ///
    /// The seek slider is left alone while it is being dragged.
    pub fn sync_from_session(&mut self, session: &Session) {
        if !self.seeking {
            self.seek = session.position_fraction();
        }
        self.elapsed = session.elapsed();
        self.duration = session.duration();
        self.playing = session.is_playing();
    }

    /// Forget the previous file
    pub fn unload(&mut self) {
        self.loaded = false;
        self.playing = false;
        self.seek = 0.0;
        self.elapsed = 0.0;
        self.duration = 0.0;
        self.file_name = None;
    }

    pub fn view<'a>(&'a self, status: &'a str) -> Element<'a, Message> {
        let open = button(text("Open…")).on_press_maybe((!self.loading).then_some(Message::OpenFile));
        let play = button(text("Play"))
            .on_press_maybe((self.loaded && !self.playing).then_some(Message::Play));
        let pause = button(text("Pause"))
            .on_press_maybe((self.loaded && self.playing).then_some(Message::Pause));

        let title = text(self.file_name.as_deref().unwrap_or("No file loaded")).size(18);

        let header = row![open, play, pause, Space::new().width(Fill), title]
            .spacing(10)
            .align_y(Center);

        let seek = row![
            text(format_time(self.elapsed)).size(14),
            slider(0.0..=1.0, self.seek, Message::SeekChanged)
                .step(0.001)
                .on_release(Message::SeekReleased),
            text(format_time(self.duration)).size(14),
        ]
        .spacing(10)
        .align_y(Center);

        let controls = column![
            labeled_slider("Tempo", self.tempo, SHIFT_RANGE, Message::SetTempo),
            labeled_slider("Pitch", self.pitch, SHIFT_RANGE, Message::SetPitch),
            labeled_slider("Volume", self.volume, 0.0..=1.0, Message::SetVolume),
        ]
        .spacing(8);

        let status_bar = container(text(status).size(12)).padding(5);

        column![header, seek, controls, Space::new().height(Fill), status_bar]
            .spacing(16)
            .padding(16)
            .into()
    }
}

fn labeled_slider<'a>(
    label: &'a str,
    value: f64,
    range: std::ops::RangeInclusive<f64>,
    on_change: fn(f64) -> Message,
) -> Element<'a, Message> {
    row![
        text(label).size(14).width(70),
        slider(range, value, on_change)
            .step(0.01)
            .on_release(Message::PersistParams),
        text(format!("{:.2}×", value)).size(14).width(60),
    ]
    .spacing(10)
    .align_y(Center)
    .into()
}

/// Format seconds as `m:ss`
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
