//! Main iced application for Warble
//!
//! Owns the config and at most one playback session. Decoding runs on a
//! blocking worker; the output stream is opened back on the UI thread.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use iced::time;
use iced::{Element, Subscription, Task, Theme};

use warble_core::config::WarbleConfig;
use warble_core::session::Session;

use super::message::Message;
use super::player_view::PlayerView;

/// File extensions offered by the file picker
const AUDIO_EXTENSIONS: [&str; 9] = ["mp3", "flac", "wav", "ogg", "oga", "m4a", "aac", "aiff", "caf"];

/// Event drain period
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Application state
pub struct WarbleApp {
    config: WarbleConfig,
    config_path: PathBuf,
    session: Option<Session>,
    player: PlayerView,
    status: String,
}

impl WarbleApp {
    pub fn new(config: WarbleConfig, config_path: PathBuf) -> Self {
        let player = PlayerView::new(config.playback.params());
        Self {
            config,
            config_path,
            session: None,
            player,
            status: "Open a file to start".to_string(),
        }
    }

    /// Update application state
    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                if let Some(ref mut session) = self.session {
                    if session.handle_events() {
                        self.player.sync_from_session(session);
                        self.status = "Finished".to_string();
                    }
                }
                Task::none()
            }

            Message::Poll => {
                if let Some(ref session) = self.session {
                    self.player.sync_from_session(session);
                }
                Task::none()
            }

            Message::OpenFile => {
                if self.player.loading {
                    return Task::none();
                }
                Task::perform(
                    async {
                        rfd::AsyncFileDialog::new()
                            .add_filter("Audio files", &AUDIO_EXTENSIONS)
                            .pick_file()
                            .await
                            .map(|f| f.path().to_path_buf())
                    },
                    Message::FileChosen,
                )
            }

            Message::FileChosen(path) => match path {
                Some(path) => self.update(Message::LoadFile(path)),
                None => Task::none(),
            },

            Message::LoadFile(path) => {
                // Release the previous file before decoding the next one
                if self.session.take().is_some() {
                    self.player.unload();
                }
                self.player.loading = true;
                self.status = format!("Loading {}…", path.display());

                let audio = self.config.audio.clone();
                Task::perform(
                    async move {
                        tokio::task::spawn_blocking(move || {
                            Session::prepare(&path, &audio).map_err(|e| e.to_string())
                        })
                        .await
                        .unwrap_or_else(|e| Err(format!("Load task failed: {}", e)))
                    },
                    Message::FileLoaded,
                )
            }

            Message::FileLoaded(result) => {
                self.player.loading = false;
                let file = match result {
                    Ok(file) => file,
                    Err(e) => {
                        log::error!("Failed to load file: {}", e);
                        self.status = format!("Error loading file: {}", e);
                        return Task::none();
                    }
                };

                let name = file.file_name();
                match Session::start(file, &self.config.audio, self.player.params()) {
                    Ok(mut session) => {
                        if self.config.playback.autoplay {
                            session.play();
                        }
                        self.player.loaded = true;
                        self.player.file_name = Some(name.clone());
                        self.player.sync_from_session(&session);
                        self.status = match session.audio() {
                            Some(audio) => format!("Loaded {} ({})", name, audio.describe()),
                            None => format!("Loaded {}", name),
                        };
                        self.session = Some(session);
                    }
                    Err(e) => {
                        log::error!("Failed to start playback of {}: {}", name, e);
                        self.status = format!("Audio error: {}", e);
                    }
                }
                Task::none()
            }

            Message::Play => {
                if let Some(ref mut session) = self.session {
                    session.play();
                    self.player.playing = session.is_playing();
                    self.status = "Playing".to_string();
                }
                Task::none()
            }

            Message::Pause => {
                if let Some(ref mut session) = self.session {
                    session.pause();
                    self.player.sync_from_session(session);
                    self.status = "Paused".to_string();
                }
                Task::none()
            }

            Message::SeekChanged(fraction) => {
                self.player.seek = fraction;
                self.player.seeking = true;
                if let Some(ref mut session) = self.session {
                    session.seek_percent(fraction * 100.0);
                }
                Task::none()
            }

            Message::SeekReleased => {
                self.player.seeking = false;
                Task::none()
            }

            Message::SetPitch(pitch) => {
                self.player.pitch = pitch;
                if let Some(ref session) = self.session {
                    session.set_pitch(pitch);
                }
                Task::none()
            }

            Message::SetTempo(tempo) => {
                self.player.tempo = tempo;
                if let Some(ref session) = self.session {
                    session.set_tempo(tempo);
                }
                Task::none()
            }

            Message::SetVolume(volume) => {
                self.player.volume = volume;
                if let Some(ref session) = self.session {
                    session.set_volume(volume);
                }
                Task::none()
            }

            Message::PersistParams => {
                self.config.playback.remember(self.player.params());
                let config = self.config.clone();
                let path = self.config_path.clone();
                Task::perform(
                    async move { persist_config(config, path).await.map_err(|e| format!("{:#}", e)) },
                    Message::ParamsSaved,
                )
            }

            Message::ParamsSaved(result) => {
                if let Err(e) = result {
                    log::warn!("Failed to save config: {}", e);
                    self.status = format!("Config save failed: {}", e);
                }
                Task::none()
            }
        }
    }

    /// Event drain while a file is loaded, position poll while playing
    pub fn subscription(&self) -> Subscription<Message> {
        let Some(ref session) = self.session else {
            return Subscription::none();
        };

        let tick = time::every(TICK_INTERVAL).map(|_| Message::Tick);
        if !session.poll_active() {
            return tick;
        }

        let poll_interval = Duration::from_millis(self.config.playback.poll_interval_ms);
        let poll = time::every(poll_interval).map(|_| Message::Poll);
        Subscription::batch([tick, poll])
    }

    /// Build the view
    pub fn view(&self) -> Element<'_, Message> {
        self.player.view(&self.status)
    }

    pub fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Write `config` to `path` on a blocking worker
async fn persist_config(config: WarbleConfig, path: PathBuf) -> anyhow::Result<()> {
    let target = path.clone();
    tokio::task::spawn_blocking(move || config.save(&target))
        .await
        .context("Config save task panicked")?
        .with_context(|| format!("Saving {}", path.display()))
}
