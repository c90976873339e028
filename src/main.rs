mod apdu;
mod app;
mod cards;
mod config;
mod error;
mod logging;
mod nfc_service;
mod simulator;
mod tag_detect;
mod tags;
mod types;

use anyhow::Context;
use log::info;

fn main() -> anyhow::Result<()> {
    // let the reader and serial console settle
    std::thread::sleep(config::STARTUP_DELAY);

    logging::init();
    println!("Starting NFC tag detection...");

    let config = config::Config::from_env().context("invalid configuration")?;
    info!("Using {:?} backend", config.backend);

    let app = app::App::init(&config).context("failed to initialise the NFC stack")?;
    app.run();
    Ok(())
}
