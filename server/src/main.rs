// storefront_server/src/main.rs

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use storefront_core::{CatalogService, MediaRoot, MemoryCache};
use storefront_server::config::AppConfig;
use storefront_server::{app, db, services::auth_service, telemetry};

#[derive(Parser, Debug)]
#[command(name = "storefront_server", about = "Storefront REST and GraphQL server")]
struct Cli {
  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run the HTTP server and the job worker (default)
  Serve,
  /// Apply the embedded database migrations
  Migrate,
  CreateUser {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    superuser: bool,
  },
  /// Delete the products whose ids are listed in the first column of a CSV file
  DeleteDuplicates { csv: PathBuf },
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();
  let config = AppConfig::from_env()?;
  telemetry::init(config.log_format);

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => {
      tracing::info!("Starting storefront server...");
      app::serve(config).await?;
    }
    Command::Migrate => {
      let pool = db::connect(&config).await?;
      db::migrate(&pool).await?;
    }
    Command::CreateUser { username, email, password, superuser } => {
      let storage = app::open_storage(&config).await?;
      let user = auth_service::create_user(storage.as_ref(), &username, &email, &password, superuser).await?;
      println!("Created user {} (id {}).", user.username, user.id);
    }
    Command::DeleteDuplicates { csv } => {
      let storage = app::open_storage(&config).await?;
      let catalog = CatalogService::new(
        storage,
        Arc::new(MemoryCache::new()),
        MediaRoot::new(config.media_root.clone()),
        config.service_settings(),
      );
      let deleted = app::delete_duplicates(&catalog, &csv).await?;
      println!("Deleted {} products.", deleted);
    }
  }
  Ok(())
}
