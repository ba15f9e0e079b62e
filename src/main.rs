use std::{env, process::ExitCode, sync::Arc};

use clap::Parser;
use log::{error, info, LevelFilter};
use warp::Filter;

mod app;
mod args;
mod backend;
mod feedback;
mod form;
mod pages;
mod password;
mod routes;
mod session;
mod time;
mod user;

use app::App;
use args::Args;
use backend::Backend;
use password::Hasher;
use session::SessionConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let mut logger = pretty_env_logger::formatted_timed_builder();
    logger.filter_level(LevelFilter::Info);
    if let Ok(filters) = env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }
    logger.init();

    let args = Args::parse();

    let addr = match args.addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("invalid address: {e}");
            return ExitCode::FAILURE;
        }
    };

    let Ok(backend) = Backend::new(args.data_dir()).await else {
        return ExitCode::FAILURE;
    };

    let app = Arc::new(App::new(
        backend,
        Hasher::new(),
        SessionConfig::new(args.secure(), args.session_days()),
    ));

    let routes = routes::routes(app).with(warp::log("feedback"));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("couldn't listen for ctrl-c: {e}");
        }
    };

    let (addr, server) = match warp::serve(routes).try_bind_with_graceful_shutdown(addr, shutdown)
    {
        Ok(bound) => bound,
        Err(e) => {
            error!("couldn't listen on {addr}: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("listening on {addr}");
    server.await;
    info!("shut down");

    ExitCode::SUCCESS
}
