use std::net::SocketAddr;

use anyhow::Context;

const DEFAULT_MOVIES_SOURCE: &str =
    "https://raw.githubusercontent.com/tomasonjo/blog-datasets/main/movies/movies_small.csv";
const DEFAULT_RATINGS_SOURCE: &str =
    "https://raw.githubusercontent.com/tomasonjo/blog-datasets/main/movies/ratings_small.csv";

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub movies_source: String,
    pub ratings_source: String,
    pub ratings_batch_size: usize,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_rps: u32,
    pub agent_max_steps: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://cinegraph.db?mode=rwc".to_string());

        let movies_source =
            std::env::var("MOVIES_SOURCE").unwrap_or_else(|_| DEFAULT_MOVIES_SOURCE.to_string());
        let ratings_source =
            std::env::var("RATINGS_SOURCE").unwrap_or_else(|_| DEFAULT_RATINGS_SOURCE.to_string());

        let ratings_batch_size: usize = std::env::var("RATINGS_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(crate::loader::RATINGS_BATCH_SIZE);

        let llm_api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .unwrap_or_default();
        let llm_base_url = std::env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let llm_model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let llm_rps: u32 = std::env::var("LLM_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(2);

        let agent_max_steps: usize =
            std::env::var("AGENT_MAX_STEPS").ok().and_then(|s| s.parse().ok()).unwrap_or(5);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            movies_source,
            ratings_source,
            ratings_batch_size: ratings_batch_size.max(1),
            llm_api_key,
            llm_base_url,
            llm_model,
            llm_rps,
            agent_max_steps: agent_max_steps.max(1),
        })
    }
}
