use log::error;
use shift_solver::config::{ServerConfig, SolverConfig};
use shift_solver::server;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let solver = match SolverConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = server::run_server(ServerConfig::from_env(), solver).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
