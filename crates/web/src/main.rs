use std::{process::ExitCode, sync::Arc};

use fixture::JsonFileFixtureLoader;
use simulation::{
    factory::SimulatorFactory,
    pool::WorkerPool,
    registry::{self, Registry},
};
use web::{config::ServerConfig, start_web_server, WebState};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(why) => {
            log::error!("{}", why);
            return ExitCode::FAILURE;
        }
    };
    log::debug!("{:?}", config);

    // simulation engine
    let registry = registry::run(
        Registry::new(SimulatorFactory::new(), WorkerPool::new(&config.pool_config())),
        config.mailbox_capacity,
    );

    // fixture
    let fixtures = JsonFileFixtureLoader::new(&config.fixture_path);
    log::info!("simulators start from {}", fixtures.path().display());

    // web server
    let state = WebState {
        registry,
        fixtures: Arc::new(fixtures),
        stream_interval: config.stream_interval,
    };
    match start_web_server(&config.bind_address, state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(why) => {
            log::error!("web server stopped: {}", why);
            ExitCode::FAILURE
        }
    }
}
