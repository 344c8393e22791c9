//! Warble - minimal audio player with independent pitch and tempo
//!
//! Entry point for the GUI application. It:
//! 1. Initializes logging and loads the YAML config
//! 2. Launches the iced GUI
//! 3. Optionally loads the file given on the command line
//!
//! ## Usage
//!
//! `warble-player [FILE]`

mod ui;

use std::path::PathBuf;

use iced::{Size, Task};

use ui::{Message, WarbleApp};
use warble_core::config::{default_config_path, WarbleConfig};

fn main() -> iced::Result {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("warble-player starting up");

    let initial_file = std::env::args_os().nth(1).map(PathBuf::from);
    if let Some(ref path) = initial_file {
        log::info!("Loading {:?} from command line", path);
    }

    let config_path = default_config_path();
    let config = WarbleConfig::load(&config_path);

    // The boot closure must be Fn; it only runs once, so take from a cell
    let boot_state = std::cell::RefCell::new(Some((config, config_path, initial_file)));

    iced::application(
        move || {
            let (config, config_path, initial_file) = boot_state
                .borrow_mut()
                .take()
                .unwrap_or_else(|| (WarbleConfig::default(), default_config_path(), None));
            let app = WarbleApp::new(config, config_path);

            let startup_task = match initial_file {
                Some(path) => Task::done(Message::LoadFile(path)),
                None => Task::none(),
            };
            (app, startup_task)
        },
        update,
        view,
    )
    .subscription(subscription)
    .theme(theme)
    .title("Warble")
    .window_size(Size::new(640.0, 360.0))
    .run()
}

/// Update function for iced
fn update(app: &mut WarbleApp, message: Message) -> Task<Message> {
    app.update(message)
}

/// View function for iced
fn view(app: &WarbleApp) -> iced::Element<'_, Message> {
    app.view()
}

/// Subscription function for iced
fn subscription(app: &WarbleApp) -> iced::Subscription<Message> {
    app.subscription()
}

/// Theme function for iced
fn theme(app: &WarbleApp) -> iced::Theme {
    app.theme()
}
