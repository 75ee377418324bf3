use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logistics_schema::dao::Store;
use logistics_schema::dao::memory::MemoryStore;
use logistics_schema::dao::postgres::PostgresStore;
use logistics_schema::model::apperror::{ApplicationError, ErrorType};
use logistics_schema::model::config::{AdminCommand, ApplicationArguments, Config, DatabaseType, LoggingConfig, parse_config};
use logistics_schema::model::entities::EntityKind;
use logistics_schema::model::models::{ListInput, PaginationInput};
use logistics_schema::service::logistics::LogisticsService;

/**
 * Operator entry point: inspect and clean up the logistics records.
 */
#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = ApplicationArguments::parse();

    let config = get_config(&args.config_file)?;

    init_tracing(&config.logging)?;

    let result = match &config.database.db_type {
        DatabaseType::Postgresql { .. } => {
            let store = PostgresStore::connect(&config.database.db_type).await.map_err(std::io::Error::other)?;
            run_command(&LogisticsService::new(store), &args.command).await
        }
        DatabaseType::Memory => {
            tracing::warn!("Using the in-memory store, nothing will be persisted");
            run_command(&LogisticsService::new(MemoryStore::new()), &args.command).await
        }
    };
    result.map_err(|err| {
        tracing::error!("Command failed: {err}");
        std::io::Error::other(err)
    })
}

/**
 * Runs one administrative command against the store.
 *
 * #Arguments
 * `service`: The service to run the command with.
 * `command`: The command to run.
 *
 * #Returns
 * A `Result` indicating success or failure.
 */
async fn run_command<S: Store>(service: &LogisticsService<S>, command: &AdminCommand) -> Result<(), ApplicationError> {
    match command {
        AdminCommand::Summary => {
            for kind in EntityKind::ALL {
                let count = service.count(kind).await?;
                println!("{:<12} {count}", kind.verbose_name_plural());
            }
        }
        AdminCommand::List { entity, start_index, page_size, json } => {
            let list_input = ListInput { pagination: PaginationInput { start_index: *start_index, page_size: *page_size }, ..ListInput::default() };
            let output = service.list_records(*entity, list_input).await?;
            for record in &output.elements {
                if *json {
                    let line = serde_json::to_string(record).map_err(|err| ApplicationError::new(ErrorType::Application, format!("Failed to serialize {entity} {}: {err}", record.id())))?;
                    println!("{line}");
                } else {
                    println!("{:>8}  {record}", record.id());
                }
            }
            if output.pagination.has_more {
                tracing::info!("More records available from start index {}", output.pagination.start_index + output.pagination.page_size);
            }
        }
        AdminCommand::Delete { entity, id } => {
            service.delete_record(*entity, *id).await?;
            println!("Deleted {} {id}", entity.verbose_name());
        }
    }
    Ok(())
}

/**
 * Initializes logging to standard error.
 *
 * #Arguments
 * `logging`: Logging configuration. `RUST_LOG` is honored, configured directives are added to it.
 *
 * #Returns
 * A `Result` indicating success or failure.
 */
fn init_tracing(logging: &LoggingConfig) -> Result<(), std::io::Error> {
    let mut env_filter = EnvFilter::from_default_env();
    for directive in &logging.directives {
        let directive: Directive = directive.parse().map_err(|err| std::io::Error::other(format!("Invalid logging directive {directive}: {err}")))?;
        env_filter = env_filter.add_directive(directive);
    }
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(logging.target)
        .with_thread_ids(logging.thread_ids)
        .with_thread_names(logging.thread_names)
        .with_line_number(logging.line_number)
        .with_level(logging.level)
        .with_ansi(logging.ansi);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| std::io::Error::other(format!("Failed to initialize logging: {err}")))
}

/**
 * Reads the configuration from the specified file.
 *
 * #Arguments
 * `config_file`: The path to the configuration file.
 *
 * #Returns
 * A `Result` containing the parsed `Config` or an `std::io::Error` if reading or parsing fails.
*/
fn get_config(config_file: &str) -> Result<Config, std::io::Error> {
    let config_str: String = std::fs::read_to_string(config_file).map_err(|err| std::io::Error::other(format!("Failed to read config file: {err}")))?;
    parse_config(&config_str).map_err(|err| std::io::Error::other(format!("Failed to parse config file: {err}")))
}
