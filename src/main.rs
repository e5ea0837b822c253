use log::{error, info};
use cluehunt::configuration::config::{Args, Config};
use cluehunt::controller::controller_handler::Controller;

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    info!("cluehunt v{}", env!("CARGO_PKG_VERSION"));
    info!("Importing configuration");

    let args = Args::from_args();
    let config = Config::load(&args).unwrap_or_else(|e| {
        error!("Unable to import configuration: {}", e);
        std::process::exit(1);
    });

    info!("Configuration imported successfully");

    // The controller owns storage that may carry its own runtime, so it is
    // declared before (and dropped after) the server runtime.
    let controller = Controller::new(config).unwrap_or_else(|e| {
        error!("Unable to create a controller instance: {}, exiting...", e);
        std::process::exit(1);
    });

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            error!("Unable to start the async runtime: {}", e);
            std::process::exit(1);
        });

    if let Err(e) = rt.block_on(controller.run()) {
        error!("Error occurred in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
    info!("Bye");
}
