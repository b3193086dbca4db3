use std::process::ExitCode;

use log::{error, info};

use agora_runner::{Simulation, SimulationConfig, config};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let catalog_path = args.get(1).map(String::as_str).unwrap_or("data/catalog.json");
    let agents_path = args.get(2).map(String::as_str).unwrap_or("data/agents.json");

    let mut sim_config = SimulationConfig::default();
    if let Some(rounds) = args.get(3) {
        match rounds.parse() {
            Ok(rounds) => sim_config.rounds = rounds,
            Err(_) => {
                error!("invalid round count: {rounds}");
                return ExitCode::FAILURE;
            }
        }
    }

    let catalog = match config::load_catalog(catalog_path) {
        Ok(catalog) => catalog,
        Err(err) => {
            error!("failed to load catalog from {catalog_path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let agents = match config::load_agents(agents_path, &catalog) {
        Ok(agents) => agents,
        Err(err) => {
            error!("failed to load agents from {agents_path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "starting: {} products, {} agents, {} rounds",
        catalog.len(),
        agents.len(),
        sim_config.rounds
    );

    let report = Simulation::new(catalog, agents, sim_config).run().await;

    info!(
        "{} trades executed over {} rounds",
        report.total_trades(),
        report.rounds_run
    );
    for agent in &report.agents {
        info!(
            "{} ({}) final balance {}, {} product kinds in stock",
            agent.name,
            agent.role,
            agent.balance,
            agent.stock.len()
        );
    }

    ExitCode::SUCCESS
}
