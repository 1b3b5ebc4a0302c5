mod agent;
mod config;
mod db;
mod entities;
mod error;
#[cfg(test)]
mod fixtures;
mod fulltext;
mod graph;
mod llm;
mod loader;
mod models;
mod routes;
mod semantic;
mod session;
mod templates;

use std::{sync::Arc, time::Duration};

use clap::{Parser, Subcommand};

use crate::{
    agent::Agent, config::Config, graph::GraphStore, llm::LlmClient, semantic::SemanticLayer,
    session::SessionStore,
};

pub struct AppState {
    pub graph: GraphStore,
    pub layer: SemanticLayer,
    pub agent: Agent,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(graph: GraphStore, llm: LlmClient, max_steps: usize) -> Self {
        let layer = SemanticLayer::new(graph.clone());
        let agent = Agent::new(Arc::new(llm), layer.clone(), max_steps);
        Self { graph, layer, agent, sessions: SessionStore::new() }
    }
}

#[derive(Parser)]
#[command(name = "cinegraph", version, about = "Movie graph semantic layer with an LLM agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the movie and rating datasets into the graph store
    Load {
        /// Movies CSV (path or URL)
        #[arg(long)]
        movies: Option<String>,

        /// Ratings CSV (path or URL)
        #[arg(long)]
        ratings: Option<String>,
    },
    /// Run the Search tool
    Search { text: String },
    /// Run the Recommender tool
    Recommend { text: String },
    /// Ask the agent a question
    Ask { question: String },
    /// Start the HTTP server
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,cinegraph=debug,sqlx=warn".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let http = wreq::Client::builder().timeout(Duration::from_secs(60)).build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let graph = GraphStore::new(db);

    let llm = LlmClient::new(
        http.clone(),
        config.llm_api_key.clone(),
        config.llm_base_url.clone(),
        config.llm_model.clone(),
        config.llm_rps,
    );
    let state = Arc::new(AppState::new(graph, llm, config.agent_max_steps));

    if !matches!(cli.command, Command::Load { .. }) {
        state.graph.refresh_index().await?;
    }

    match cli.command {
        Command::Load { movies, ratings } => {
            let movies_src = movies.as_deref().unwrap_or(&config.movies_source);
            let ratings_src = ratings.as_deref().unwrap_or(&config.ratings_source);

            let (movies_csv, ratings_csv) = futures::try_join!(
                loader::fetch_source(&http, movies_src),
                loader::fetch_source(&http, ratings_src),
            )?;
            let report =
                loader::load(&state.graph, &movies_csv, &ratings_csv, config.ratings_batch_size)
                    .await?;

            println!(
                "loaded {} movies, {} ratings ({} skipped) in {} batches",
                report.movies, report.ratings_read, report.ratings_skipped, report.batches
            );
        },
        Command::Search { text } => println!("{}", state.layer.search(&text).await?),
        Command::Recommend { text } => println!("{}", state.layer.recommend(&text).await?),
        Command::Ask { question } => {
            let reply = state.agent.run(&[], &question).await?;
            for step in &reply.steps {
                tracing::info!(tool = step.tool.name(), input = %step.input, "tool used");
            }
            println!("{}", reply.answer);
        },
        Command::Serve => {
            let app = routes::router(state);
            let listener = tokio::net::TcpListener::bind(config.addr).await?;
            tracing::info!(addr = %config.addr, "listening");
            axum::serve(listener, app).await?;
        },
    }

    Ok(())
}
