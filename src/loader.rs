use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use sea_orm::{Set, TransactionTrait};
use tracing::{debug, info, warn};

use crate::{
    entities::{movie, rated},
    error::AppResult,
    graph::{GraphStore, merge},
    models::{LoadReport, MovieRecord, RatingRecord},
};

pub const RATINGS_BATCH_SIZE: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to download {url}")]
    Download {
        url: String,
        #[source]
        source: wreq::Error,
    },
    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed row in {dataset} dataset")]
    Malformed {
        dataset: &'static str,
        #[source]
        source: csv::Error,
    },
}

/// Reads a dataset from a local path or an `http(s)` URL.
pub async fn fetch_source(http: &wreq::Client, source: &str) -> Result<String, LoadError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        debug!(url = %source, "downloading dataset");
        let download = async {
            http.get(source).send().await?.error_for_status()?.text().await
        };
        return download
            .await
            .map_err(|e| LoadError::Download { url: source.to_string(), source: e });
    }

    tokio::fs::read_to_string(source)
        .await
        .map_err(|e| LoadError::Read { path: source.to_string(), source: e })
}

/// Loads both datasets and refreshes the entity index.
pub async fn load(
    graph: &GraphStore,
    movies_csv: &str,
    ratings_csv: &str,
    batch_size: usize,
) -> AppResult<LoadReport> {
    let movies = load_movies(graph, movies_csv).await?;
    let mut report = load_ratings(graph, ratings_csv, batch_size).await?;
    report.movies = movies;
    graph.refresh_index().await?;
    info!(?report, "load complete");
    Ok(report)
}

fn reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(text.as_bytes())
}

pub fn parse_movies(text: &str) -> Result<Vec<MovieRecord>, LoadError> {
    reader(text)
        .deserialize()
        .collect::<Result<Vec<MovieRecord>, _>>()
        .map_err(|source| LoadError::Malformed { dataset: "movies", source })
}

/// Splits a `|`-separated list column, dropping blank entries.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn valid_release(movie_id: i64, released: Option<String>) -> Option<String> {
    let released = released?;
    match released.parse::<jiff::civil::Date>() {
        Ok(_) => Some(released),
        Err(err) => {
            warn!(movie_id = movie_id, released = %released, error = %err, "ignoring unparsable release date");
            None
        },
    }
}

/// Merges movies with their people and genres in a single transaction.
pub async fn load_movies(graph: &GraphStore, text: &str) -> AppResult<usize> {
    let records = parse_movies(text)?;

    let mut movies = BTreeMap::new();
    let mut persons = BTreeSet::new();
    let mut genres = BTreeSet::new();
    let mut directed = BTreeSet::new();
    let mut acted_in = BTreeSet::new();
    let mut has_genre = BTreeSet::new();

    for rec in records {
        let id = rec.movie_id;
        for name in split_list(rec.director.as_deref()) {
            persons.insert(name.clone());
            directed.insert((name, id));
        }
        for name in split_list(rec.actors.as_deref()) {
            persons.insert(name.clone());
            acted_in.insert((name, id));
        }
        for name in split_list(rec.genres.as_deref()) {
            genres.insert(name.clone());
            has_genre.insert((id, name));
        }
        movies.insert(
            id,
            movie::ActiveModel {
                id: Set(id),
                title: Set(rec.title),
                released: Set(valid_release(id, rec.released)),
                imdb_rating: Set(rec.imdb_rating),
            },
        );
    }

    let count = movies.len();
    debug!(
        movies = count,
        persons = persons.len(),
        genres = genres.len(),
        "merging movie dataset"
    );

    let txn = graph.db().begin().await?;
    merge::movies(&txn, movies.into_values().collect()).await?;
    merge::persons(&txn, persons.into_iter().collect()).await?;
    merge::genres(&txn, genres.into_iter().collect()).await?;
    merge::directed(&txn, directed.into_iter().collect()).await?;
    merge::acted_in(&txn, acted_in.into_iter().collect()).await?;
    merge::has_genre(&txn, has_genre.into_iter().collect()).await?;
    txn.commit().await?;

    Ok(count)
}

/// Merges ratings in transactions of `batch_size` rows. Ratings of unknown
/// movies are skipped.
pub async fn load_ratings(graph: &GraphStore, text: &str, batch_size: usize) -> AppResult<LoadReport> {
    let known: HashSet<i64> = graph.movie_ids().await?.into_iter().collect();
    let batch_size = batch_size.max(1);

    let mut report = LoadReport::default();
    let mut batch = Vec::with_capacity(batch_size.min(RATINGS_BATCH_SIZE));

    let mut rdr = reader(text);
    for rec in rdr.deserialize::<RatingRecord>() {
        let rec = rec.map_err(|source| LoadError::Malformed { dataset: "ratings", source })?;
        report.ratings_read += 1;
        batch.push(rec);
        if batch.len() == batch_size {
            commit_batch(graph, &known, std::mem::take(&mut batch), &mut report).await?;
        }
    }
    if !batch.is_empty() {
        commit_batch(graph, &known, batch, &mut report).await?;
    }

    Ok(report)
}

async fn commit_batch(
    graph: &GraphStore,
    known: &HashSet<i64>,
    batch: Vec<RatingRecord>,
    report: &mut LoadReport,
) -> AppResult<()> {
    let rows = batch.len();
    let mut users = BTreeSet::new();
    let mut ratings = HashMap::new();

    for rec in batch {
        if !known.contains(&rec.movie_id) {
            report.ratings_skipped += 1;
            continue;
        }
        users.insert(rec.user_id);
        ratings.insert(
            (rec.user_id, rec.movie_id),
            rated::ActiveModel {
                user_id: Set(rec.user_id),
                movie_id: Set(rec.movie_id),
                rating: Set(rec.rating),
                timestamp: Set(rec.timestamp),
            },
        );
    }

    let txn = graph.db().begin().await?;
    merge::users(&txn, users.into_iter().collect()).await?;
    merge::ratings(&txn, ratings.into_values().collect()).await?;
    txn.commit().await?;

    report.batches += 1;
    debug!(batch = report.batches, rows = rows, "committed ratings batch");
    Ok(())
}
