use clap::{Parser, Subcommand, ValueEnum};
use sea_orm_migration::MigratorTrait;
use warden_core::logging::{self, LogFormat};
use warden_core::migrations::Migrator;
use warden_core::{App, Config, SeaStore};

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Multi-scheme authentication server")]
#[command(version)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogStyle::Plain)]
    log_format: LogStyle,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogStyle {
    Plain,
    Pretty,
    Json,
}

impl From<LogStyle> for LogFormat {
    fn from(style: LogStyle) -> Self {
        match style {
            LogStyle::Plain => LogFormat::Plain,
            LogStyle::Pretty => LogFormat::Pretty,
            LogStyle::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations and start the server
    Serve,
    /// Create the default admin account if it does not exist
    Seed,
    /// Database migrations
    Migrate {
        /// Roll back this many migrations instead of applying pending ones
        #[arg(long)]
        rollback: Option<u32>,
    },
    /// OpenAPI documentation operations
    Docs {
        #[command(subcommand)]
        action: DocsCommands,
    },
}

#[derive(Subcommand)]
enum DocsCommands {
    /// Write the OpenAPI document to a file
    Export {
        /// Output format: json or yaml
        #[arg(long, default_value = "json")]
        format: String,
        /// Output file path
        #[arg(long, default_value = "openapi.json")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logging::init(cli.log_format.into(), "info,sqlx=warn");

    match cli.command {
        Commands::Serve => {
            let app = App::new().await?;
            app.run().await?;
        }
        Commands::Seed => {
            let config = Config::from_env()?;
            let db = warden_core::db::connect(&config).await?;
            Migrator::up(&db, None).await?;

            let store = SeaStore::new(db, config.store_timeout());
            let (admin, created) = warden_core::seed::seed_admin(&store).await?;
            if created {
                println!("Created user '{}' (id {})", admin.username, admin.id);
            } else {
                println!("User '{}' already exists, nothing to do", admin.username);
            }
        }
        Commands::Migrate { rollback } => {
            let config = Config::from_env()?;
            let db = warden_core::db::connect(&config).await?;
            match rollback {
                Some(steps) => {
                    tracing::info!(steps, "Rolling back migrations...");
                    Migrator::down(&db, Some(steps)).await?;
                    tracing::info!("Rollback complete.");
                }
                None => {
                    tracing::info!("Running pending database migrations...");
                    Migrator::up(&db, None).await?;
                    tracing::info!("Migrations complete.");
                }
            }
        }
        Commands::Docs { action } => match action {
            DocsCommands::Export { format, output } => export_openapi(&format, &output)?,
        },
    }

    Ok(())
}

fn export_openapi(format: &str, output: &str) -> Result<(), Box<dyn std::error::Error>> {
    use utoipa::OpenApi;
    use warden_core::openapi::ApiDoc;

    let document = match format {
        "json" => ApiDoc::openapi().to_pretty_json()?,
        "yaml" => ApiDoc::openapi().to_yaml()?,
        _ => return Err(format!("Unsupported format: {}. Use 'json' or 'yaml'.", format).into()),
    };

    std::fs::write(output, document)?;
    println!("OpenAPI document written to: {}", output);
    Ok(())
}
