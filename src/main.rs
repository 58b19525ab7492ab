use std::process::ExitCode;

use env_logger::Env;
use gloam::RendererConfig;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = RendererConfig::new().title("gloam").size(1280, 720);
    match gloam::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Shutting down: {e}");
            ExitCode::FAILURE
        }
    }
}
