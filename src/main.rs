//! # Medgate CLI (`medgate`)
//!
//! The `medgate` binary wires the pieces together: database initialization,
//! user provisioning, and the HTTP gateway.
//!
//! ## Usage
//!
//! ```bash
//! medgate --config ./config/medgate.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `medgate init` | Create the auth and patient SQLite databases |
//! | `medgate user add <name>` | Create or update a user account |
//! | `medgate serve` | Build the knowledge base and start the gateway |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use medgate::{config, credentials, embedding, generate, index, migrate, retrieval, router,
    server, sql_agent, token};

/// Medgate — a token-authenticated router for medical questions over a
/// patient database and two semantic knowledge indexes.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/medgate.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "medgate",
    about = "Medgate — routes natural-language medical questions to a SQL agent and semantic indexes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/medgate.toml`. Database paths, knowledge
    /// sources, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/medgate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schemas.
    ///
    /// Creates the auth database (users table) and the patient database
    /// schema if they do not exist. Idempotent.
    Init,

    /// Manage user accounts.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Build the knowledge base and start the HTTP gateway.
    ///
    /// Extraction and embedding run before the listener binds; a domain
    /// whose build fails is served degraded rather than aborting startup.
    /// Requires `MEDGATE_TOKEN_SECRET` in the environment.
    Serve,
}

/// User management subcommands.
#[derive(Subcommand)]
enum UserAction {
    /// Create a user, or reset the password of an existing one.
    Add {
        /// Username (unique).
        username: String,

        /// Raw password; stored only as a salted argon2 hash.
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medgate=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::migrate_auth_store(&cfg.auth.database).await?;
            migrate::migrate_patient_store(&cfg.patient_db.database).await?;
            println!("Databases initialized successfully.");
        }

        Commands::User {
            action: UserAction::Add { username, password },
        } => {
            let store = credentials::CredentialStore::new(cfg.auth.database.clone());
            store.add_user(&username, &password).await?;
            println!("User '{}' saved.", username);
        }

        Commands::Serve => {
            let secret = config::token_secret()?;
            let tokens = token::TokenService::new(secret)?;
            let store = credentials::CredentialStore::new(cfg.auth.database.clone());

            let embedder: Arc<dyn embedding::Embedder> =
                embedding::create_embedder(&cfg.embedding)?.into();
            let generator: Arc<dyn generate::Generator> =
                generate::create_generator(&cfg.generation)?.into();

            info!("building knowledge base");
            let kb = Arc::new(
                index::build_knowledge_base(&cfg.knowledge, &cfg.chunking, embedder.as_ref())
                    .await,
            );

            let engine = retrieval::RetrievalEngine::new(
                embedder.clone(),
                generator.clone(),
                cfg.retrieval.top_k,
            );
            let agent = Arc::new(sql_agent::SqlQueryAgent::new(
                cfg.patient_db.database.clone(),
                generator.clone(),
            ));
            let query_router = Arc::new(router::QueryRouter::new(
                router::default_rules(),
                kb.clone(),
                engine,
                agent,
            ));

            let bind = cfg.server.bind.clone();
            let state = server::AppState {
                config: Arc::new(cfg),
                tokens,
                credentials: store,
                kb,
                router: query_router,
            };
            server::run_server(state, &bind).await?;
        }
    }

    Ok(())
}
