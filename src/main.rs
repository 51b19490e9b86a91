use std::io;

use anyhow::{Context, Result};
use log::LevelFilter;

use render_demos::app::{self, WindowInitError};
use render_demos::{AppConfig, MediaDir, RunMode};

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn init_logging() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("wgpu_core", LevelFilter::Warn)
        .filter_module("wgpu_hal", LevelFilter::Warn)
        .filter_module("naga", LevelFilter::Warn)
        .parse_env(env_logger::Env::default())
        .init();
}

fn run() -> Result<()> {
    let config = AppConfig::from_env()?;
    let media = MediaDir::new(config.media_dir.clone());

    match config.mode {
        RunMode::List => app::write_demo_list(&mut io::stdout().lock())
            .context("failed to write the demo list"),
        RunMode::Summary => print_summary(&media),
        RunMode::Interactive => match app::run(config) {
            Ok(()) => Ok(()),
            Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or WAYLAND_DISPLAY to open a window)."
                );
                print_summary(&media)
            }
            Err(err) => Err(err),
        },
    }
}

fn print_summary(media: &MediaDir) -> Result<()> {
    app::write_summary(&mut io::stdout().lock(), media).context("failed to write the summary")
}
