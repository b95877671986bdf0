//! Foodgram server and catalog administration.
//!
//! ```bash
//! foodgram serve --port 8000
//! foodgram serve --in-memory
//! foodgram migrate
//! foodgram create-tag --name Breakfast --color '#E26C2D' --slug breakfast
//! foodgram create-ingredient --name flour --unit g
//! foodgram delete-ingredient --id 12
//! ```

use std::{error::Error, sync::Arc};

use clap::{Parser, Subcommand};
use foodgram::{
    handlers::catalog::{self, IngredientForm, TagForm},
    config, routes, AppState, Config, MemoryStore, PgStore, Store,
};

#[derive(Parser)]
#[command(name = "foodgram", about = "Recipe sharing backend")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Overrides FOODGRAM_PORT
        #[arg(long)]
        port: Option<u16>,

        /// Keep all data in process memory instead of PostgreSQL
        #[arg(long)]
        in_memory: bool,
    },

    /// Apply pending database migrations
    Migrate,

    CreateTag {
        #[arg(long)]
        name: String,
        /// `#RRGGBB`
        #[arg(long)]
        color: String,
        #[arg(long)]
        slug: String,
    },

    CreateIngredient {
        #[arg(long)]
        name: String,
        #[arg(long)]
        unit: String,
    },

    /// Fails while any recipe still uses the ingredient
    DeleteIngredient {
        #[arg(long)]
        id: i32,
    },
}

async fn connect(config: &Config) -> Result<PgStore, Box<dyn Error>> {
    let store = PgStore::connect(config.database_url()?, config.max_connections).await?;
    Ok(store)
}

async fn serve(config: Config, port: Option<u16>, in_memory: bool) -> Result<(), Box<dyn Error>> {
    let store: Arc<dyn Store> = if in_memory {
        log::warn!("Using the in-memory store, data is lost on shutdown");
        Arc::new(MemoryStore::new())
    } else {
        let store = connect(&config).await?;
        store.migrate().await?;
        Arc::new(store)
    };

    let port = port.unwrap_or(config.port);
    let state = AppState::new(store, config);

    let (address, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(([0, 0, 0, 0], port), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {e}");
            }
        })?;
    log::info!("Listening on {address}");
    server.await;
    log::info!("Server stopped");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let env_file = config::load_env_file(".env");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if env_file {
        log::info!("Loaded variables from .env");
    }

    let args = Args::parse();
    let config = Config::load()?;

    match args.command {
        Command::Serve { port, in_memory } => serve(config, port, in_memory).await?,
        Command::Migrate => connect(&config).await?.migrate().await?,
        Command::CreateTag { name, color, slug } => {
            let store = connect(&config).await?;
            let tag = catalog::create_tag(&store, TagForm { name, color, slug }).await?;
            println!("{}", serde_json::to_string(&tag)?);
        }
        Command::CreateIngredient { name, unit } => {
            let store = connect(&config).await?;
            let ingredient = catalog::create_ingredient(
                &store,
                IngredientForm {
                    name,
                    measurement_unit: unit,
                },
            )
            .await?;
            println!("{}", serde_json::to_string(&ingredient)?);
        }
        Command::DeleteIngredient { id } => {
            let store = connect(&config).await?;
            catalog::delete_ingredient(&store, id).await?;
        }
    }

    Ok(())
}
