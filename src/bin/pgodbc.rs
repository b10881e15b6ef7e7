use pgodbc::config::{self, Config};
use pgodbc::core::db::OdbcBackend;
use pgodbc::repl::Repl;
use std::io;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let config = match config::load_default_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            Config::default()
        }
    };

    // Initialize the logging system; RUST_LOG takes precedence over the config
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    info!("Starting pgodbc...");

    println!("Welcome to pgodbc! A small PostgreSQL shell over ODBC.");

    let mut repl = Repl::new(OdbcBackend, config.page_size());

    // Parse CLI arguments
    let args: Vec<String> = std::env::args().collect();
    let dsn = args
        .get(1)
        .cloned()
        .or_else(|| config.default_dsn().map(String::from));
    match dsn {
        Some(dsn) => {
            println!("Attempting to connect to data source: {}", dsn);
            match repl.connect(&dsn) {
                Ok(()) => println!("Successfully connected to data source: {}", dsn),
                Err(e) => {
                    eprintln!("Failed to connect to database: {}", e);
                    println!("Starting interactive mode instead.");
                }
            }
        }
        None => println!("No data source provided. Running in interactive mode."),
    }

    if let Err(e) = repl.run(io::stdin().lock(), io::stdout()) {
        eprintln!("pgodbc: {}", e);
        std::process::exit(1);
    }
}
