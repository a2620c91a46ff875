use clap::Parser;
use macroquad::prelude::*;
use std::future::poll_fn;
use std::task::Poll;

mod assets;
mod config;
mod entity;
mod helpers;
mod intent;
mod manager;
mod session;
mod surface;
mod tilemap;

use config::{DEFAULT_CONFIG_PATH, GameConfig, WindowConfig};
use intent::InputState;
use session::{GameSession, Lifecycle, Phase};
use surface::MacroquadSurface;

const LOADING_DOT_SPEED: f32 = 3.0;
const WIN_COLOR: u32 = 0x4CAF50;
const LOSE_COLOR: u32 = 0xF44336;

/// Tile-based 2D brawler
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Game configuration file (YAML).
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

fn cli() -> Cli {
    if cfg!(target_arch = "wasm32") {
        Cli::parse_from(["tilebrawl"])
    } else {
        Cli::parse()
    }
}

fn window_conf() -> Conf {
    let window = if cfg!(target_arch = "wasm32") {
        WindowConfig::default()
    } else {
        GameConfig::load_blocking(&cli().config)
            .map(|config| config.window)
            .unwrap_or_default()
    };
    Conf {
        window_title: window.title,
        window_width: window.width,
        window_height: window.height,
        window_resizable: true,
        sample_count: 1,
        ..Default::default()
    }
}

fn draw_centered(text: &str, y: f32, size: f32, color: Color) {
    let width = measure_text(text, None, size as u16, 1.0).width;
    draw_text(text, (screen_width() - width) * 0.5, y, size, color);
}

async fn show_loading(label: &str, background: Color, phase: f32) {
    clear_background(background);
    let dots = ".".repeat((phase as usize % 3) + 1);
    draw_centered(&format!("{label}{dots}"), screen_height() * 0.5, 40.0, WHITE);
    next_frame().await;
}

async fn await_with_loading<F, T>(future: F, label: &str, background: Color) -> T
where
    F: std::future::Future<Output = T>,
{
    let mut future = std::pin::pin!(future);
    let mut phase = 0.0f32;
    loop {
        let polled = poll_fn(|cx| Poll::Ready(future.as_mut().poll(cx))).await;
        match polled {
            Poll::Ready(value) => return value,
            Poll::Pending => {
                phase += LOADING_DOT_SPEED * get_frame_time();
                show_loading(label, background, phase).await;
            }
        }
    }
}

fn draw_menu(background: Color, title: &str) {
    clear_background(background);
    let mid = screen_height() * 0.5;
    draw_centered(title, mid - 60.0, 64.0, WHITE);
    draw_centered("Enter: start game", mid + 10.0, 30.0, LIGHTGRAY);
    if !cfg!(target_arch = "wasm32") {
        draw_centered("Esc: exit", mid + 50.0, 30.0, LIGHTGRAY);
    }
}

fn draw_game_over(background: Color, won: bool, final_health: i32) {
    clear_background(background);
    let mid = screen_height() * 0.5;
    let (title, message, color) = if won {
        (
            "Victory!".to_owned(),
            "Congratulations! You defeated all enemies!".to_owned(),
            Color::from_hex(WIN_COLOR),
        )
    } else {
        (
            "Game Over".to_owned(),
            format!("You were defeated! Final Health: {final_health}"),
            Color::from_hex(LOSE_COLOR),
        )
    };
    draw_centered(&title, mid - 60.0, 64.0, color);
    draw_centered(&message, mid, 30.0, WHITE);
    draw_centered("Enter: play again   M: main menu", mid + 50.0, 26.0, LIGHTGRAY);
}

fn draw_hud(session: &GameSession) {
    let health = session
        .manager()
        .get(session.player_id())
        .map_or(0, |player| player.health());
    draw_text(&format!("Health: {health}"), 20.0, 40.0, 30.0, WHITE);
    draw_text(
        &format!("Entities: {}", session.manager().len()),
        20.0,
        70.0,
        24.0,
        LIGHTGRAY,
    );
}

#[macroquad::main(window_conf)]
async fn main() {
    let cli = cli();
    let env = env_logger::Env::default().default_filter_or(cli.log_level.as_str());
    env_logger::Builder::from_env(env).init();

    let config = match GameConfig::load(&cli.config).await {
        Ok(config) => {
            log::info!("loaded config from {}", cli.config);
            config
        }
        Err(err) => {
            log::warn!("config load failed ({err}), using defaults");
            GameConfig::default()
        }
    };
    let background = config.window.background_color();
    let mut lifecycle = Lifecycle::new();

    loop {
        match lifecycle.phase() {
            Phase::Menu => {
                draw_menu(background, &config.window.title);
                if is_key_pressed(KeyCode::Enter) {
                    let loading = GameSession::start(&config);
                    let session = await_with_loading(loading, "Loading", background).await;
                    lifecycle.start(session);
                } else if is_key_pressed(KeyCode::Escape) && !cfg!(target_arch = "wasm32") {
                    break;
                }
            }
            Phase::Playing => {
                if let Some(session) = lifecycle.session_mut() {
                    poll_fn(|cx| {
                        session.poll_loads(cx);
                        Poll::Ready(())
                    })
                    .await;
                }

                let input = InputState::sample();
                let playfield = vec2(screen_width(), screen_height());
                lifecycle.tick(&input, playfield);

                match lifecycle.session() {
                    Some(session) => {
                        let mut surface = MacroquadSurface::new(session.textures(), background);
                        session.render(&mut surface);
                        draw_hud(session);
                    }
                    None => clear_background(background),
                }
            }
            Phase::Over { won, final_health } => {
                draw_game_over(background, won, final_health);
                if is_key_pressed(KeyCode::Enter) {
                    let loading = GameSession::start(&config);
                    let session = await_with_loading(loading, "Loading", background).await;
                    lifecycle.start(session);
                } else if is_key_pressed(KeyCode::M) {
                    lifecycle.to_menu();
                }
            }
        }

        next_frame().await;
    }
}
