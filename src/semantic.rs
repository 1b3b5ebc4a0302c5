//! The semantic layer: two fixed query templates exposed as agent tools.
//!
//! Neither tool writes to the store. Both accept a single free-text string,
//! resolve it through the entity index and answer with plain text, falling
//! back to a fixed sentinel when nothing matches.

use std::collections::BTreeMap;

use sea_orm::{ConnectionTrait, EntityTrait, FromQueryResult, Statement, Value};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    entities::movie,
    error::AppResult,
    fulltext::FullTextQuery,
    graph::GraphStore,
    models::{EntityContext, NodeKey, NodeLabel, Recommendation, RelType, RelationGroup},
};

pub const NOT_FOUND: &str = "No information was found about the movie or person in the database.";
pub const NO_RECOMMENDATION: &str = "No recommendations could be found for that movie.";

pub const RATING_THRESHOLD: f64 = 3.5;
pub const RECOMMENDATION_LIMIT: i64 = 3;

const MOVIE_CONTEXT_SQL: &str = r#"
SELECT 'DIRECTED' AS rel_type, d.person_name AS name FROM directed d WHERE d.movie_id = ?
UNION ALL
SELECT 'ACTED_IN' AS rel_type, a.person_name AS name FROM acted_in a WHERE a.movie_id = ?
UNION ALL
SELECT 'HAS_GENRE' AS rel_type, h.genre_name AS name FROM has_genre h WHERE h.movie_id = ?
ORDER BY rel_type, name
"#;

const PERSON_CONTEXT_SQL: &str = r#"
SELECT 'DIRECTED' AS rel_type, m.title AS name
FROM directed d JOIN movie m ON m.id = d.movie_id
WHERE d.person_name = ?
UNION ALL
SELECT 'ACTED_IN' AS rel_type, m.title AS name
FROM acted_in a JOIN movie m ON m.id = a.movie_id
WHERE a.person_name = ?
ORDER BY rel_type, name
"#;

/// Users who liked the reference movie, and what else they liked.
const CO_RATING_SQL: &str = r#"
SELECT s.title AS title, COUNT(*) AS co_ratings
FROM rated r1
JOIN rated r2 ON r2.user_id = r1.user_id AND r2.movie_id <> r1.movie_id
JOIN movie s ON s.id = r2.movie_id
WHERE r1.movie_id = ?
  AND r1.rating > ?
  AND r2.rating > ?
GROUP BY s.id, s.title
ORDER BY co_ratings DESC, s.title ASC
LIMIT ?
"#;

#[derive(Debug, FromQueryResult)]
struct NeighbourRow {
    rel_type: String,
    name: String,
}

#[derive(Debug, FromQueryResult)]
struct CoRatingRow {
    title: String,
    co_ratings: i64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Tool {
    Search,
    Recommender,
}

impl Tool {
    pub const ALL: [Tool; 2] = [Tool::Search, Tool::Recommender];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Search => "Search",
            Tool::Recommender => "Recommender",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Tool::Search => "useful for when you need to answer questions about various actors or movies",
            Tool::Recommender => "useful for when you need to recommend a movie",
        }
    }

    /// Name of the single string argument the tool takes.
    pub fn argument(self) -> &'static str {
        match self {
            Tool::Search => "entity",
            Tool::Recommender => "movie",
        }
    }

    pub fn argument_description(self) -> &'static str {
        match self {
            Tool::Search => "movie or a person mentioned in the question",
            Tool::Recommender => "movie mentioned in the question",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Tool::ALL.into_iter().find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Clone)]
pub struct SemanticLayer {
    graph: GraphStore,
}

impl SemanticLayer {
    pub fn new(graph: GraphStore) -> Self {
        Self { graph }
    }

    pub async fn invoke(&self, tool: Tool, input: &str) -> AppResult<String> {
        debug!(tool = tool.name(), input = %input, "invoking tool");
        match tool {
            Tool::Search => self.search(input).await,
            Tool::Recommender => self.recommend(input).await,
        }
    }

    /// Search tool: textual summary of the best-matching movie or person.
    pub async fn search(&self, input: &str) -> AppResult<String> {
        Ok(match self.entity_context(input).await? {
            Some(ctx) => render_context(&ctx),
            None => NOT_FOUND.to_string(),
        })
    }

    /// Recommender tool: top co-rated titles, one per line.
    pub async fn recommend(&self, input: &str) -> AppResult<String> {
        let recs = self.recommendations(input).await?;
        if recs.is_empty() {
            return Ok(NO_RECOMMENDATION.to_string());
        }
        Ok(recs.into_iter().map(|r| r.title).collect::<Vec<_>>().join("\n"))
    }

    pub async fn resolve(&self, input: &str, label: Option<NodeLabel>) -> Option<NodeKey> {
        let query = FullTextQuery::parse(input)?;
        let index = self.graph.index().await;
        if index.is_empty() {
            warn!("entity index is empty; load the datasets first");
            return None;
        }
        let hit = index.top(&query, label);
        debug!(
            query = %query,
            label = ?label,
            hit = ?hit.as_ref().map(|h| (h.label(), &h.text)),
            "full-text lookup"
        );
        hit.map(|h| h.key)
    }

    pub async fn entity_context(&self, input: &str) -> AppResult<Option<EntityContext>> {
        let Some(key) = self.resolve(input, None).await else {
            return Ok(None);
        };

        let db = self.graph.db();
        let backend = db.get_database_backend();

        let (title, year, stmt) = match &key {
            NodeKey::Movie(id) => {
                let Some(m) = movie::Entity::find_by_id(*id).one(db).await? else {
                    return Ok(None);
                };
                let year = m.released.as_deref().and_then(release_year);
                let stmt = Statement::from_sql_and_values(
                    backend,
                    MOVIE_CONTEXT_SQL,
                    [Value::from(*id), Value::from(*id), Value::from(*id)],
                );
                (m.title, year, stmt)
            },
            NodeKey::Person(name) => {
                let stmt = Statement::from_sql_and_values(
                    backend,
                    PERSON_CONTEXT_SQL,
                    [Value::from(name.as_str()), Value::from(name.as_str())],
                );
                (name.clone(), None, stmt)
            },
        };

        let rows = NeighbourRow::find_by_statement(stmt).all(db).await?;

        let mut grouped: BTreeMap<RelType, Vec<String>> = BTreeMap::new();
        for row in rows {
            let Some(rel_type) = RelType::parse(&row.rel_type) else {
                continue;
            };
            grouped.entry(rel_type).or_default().push(row.name);
        }

        let groups = grouped
            .into_iter()
            .map(|(rel_type, mut names)| {
                names.sort();
                names.dedup();
                RelationGroup { rel_type, names }
            })
            .collect();

        Ok(Some(EntityContext { label: key.label(), key, title, year, groups }))
    }

    pub async fn recommendations(&self, input: &str) -> AppResult<Vec<Recommendation>> {
        let Some(NodeKey::Movie(movie_id)) = self.resolve(input, Some(NodeLabel::Movie)).await
        else {
            return Ok(Vec::new());
        };

        let db = self.graph.db();
        let stmt = Statement::from_sql_and_values(
            db.get_database_backend(),
            CO_RATING_SQL,
            [
                Value::from(movie_id),
                Value::from(RATING_THRESHOLD),
                Value::from(RATING_THRESHOLD),
                Value::from(RECOMMENDATION_LIMIT),
            ],
        );

        let rows = CoRatingRow::find_by_statement(stmt).all(db).await?;
        debug!(movie_id = movie_id, candidates = rows.len(), "co-rating aggregation");

        Ok(rows
            .into_iter()
            .map(|r| Recommendation { title: r.title, co_ratings: r.co_ratings })
            .collect())
    }
}

fn release_year(released: &str) -> Option<i16> {
    released.parse::<jiff::civil::Date>().ok().map(|d| d.year())
}

pub fn render_context(ctx: &EntityContext) -> String {
    let mut out = format!(
        "type:{}\ntitle: {}\nyear: {}\n",
        ctx.label.as_str(),
        ctx.title,
        ctx.year.map(|y| y.to_string()).unwrap_or_default()
    );
    for group in &ctx.groups {
        out.push_str(group.rel_type.as_str());
        out.push_str(": ");
        out.push_str(&group.names.join(", "));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn search_renders_movie_summary() {
        let layer = SemanticLayer::new(fixtures::seeded_store().await);
        let text = layer.search("casino").await.unwrap();
        assert_eq!(
            text,
            "type:Movie\ntitle: Casino\nyear: 1995\n\
             DIRECTED: Martin Scorsese\n\
             ACTED_IN: Joe Pesci, Robert De Niro, Sharon Stone\n\
             HAS_GENRE: Crime, Drama\n"
        );
    }

    #[tokio::test]
    async fn search_renders_person_summary() {
        let layer = SemanticLayer::new(fixtures::seeded_store().await);
        let text = layer.search("Robert De Niro").await.unwrap();
        assert_eq!(text, "type:Person\ntitle: Robert De Niro\nyear: \nACTED_IN: Casino, Heat\n");
    }

    #[tokio::test]
    async fn director_groups_list_directed_movies() {
        let layer = SemanticLayer::new(fixtures::seeded_store().await);
        let ctx = layer.entity_context("martin scorsese").await.unwrap().unwrap();
        assert_eq!(ctx.label, NodeLabel::Person);
        assert_eq!(ctx.groups.len(), 1);
        assert_eq!(ctx.groups[0].rel_type, RelType::Directed);
        assert_eq!(ctx.groups[0].names, vec!["Casino".to_string()]);
    }

    #[tokio::test]
    async fn fuzzy_lookup_is_idempotent() {
        let layer = SemanticLayer::new(fixtures::seeded_store().await);
        let first = layer.search("toy stroy").await.unwrap();
        assert!(first.starts_with("type:Movie\ntitle: Toy Story\n"));
        for _ in 0..3 {
            assert_eq!(layer.search("toy stroy").await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn unknown_entity_returns_sentinel() {
        let layer = SemanticLayer::new(fixtures::seeded_store().await);
        assert_eq!(layer.search("qwertyuiop").await.unwrap(), NOT_FOUND);
        assert_eq!(layer.search("").await.unwrap(), NOT_FOUND);
        assert_eq!(layer.search("qwertyuiop").await.unwrap(), NOT_FOUND);
    }

    #[tokio::test]
    async fn recommendations_rank_by_co_ratings() {
        let layer = SemanticLayer::new(fixtures::seeded_store().await);
        let recs = layer.recommendations("Casino").await.unwrap();
        assert_eq!(
            recs,
            vec![
                Recommendation { title: "Heat".into(), co_ratings: 3 },
                Recommendation { title: "Braveheart".into(), co_ratings: 2 },
                Recommendation { title: "Untitled Project".into(), co_ratings: 2 },
            ]
        );
        assert!(recs.windows(2).all(|w| w[0].co_ratings >= w[1].co_ratings));
        assert_eq!(layer.recommend("Casino").await.unwrap(), "Heat\nBraveheart\nUntitled Project");
    }

    #[tokio::test]
    async fn recommendations_never_include_the_reference_movie() {
        let layer = SemanticLayer::new(fixtures::seeded_store().await);
        for title in ["Casino", "Heat", "Braveheart", "Toy Story"] {
            let recs = layer.recommendations(title).await.unwrap();
            assert!(recs.iter().all(|r| r.title != title), "{title} recommended itself");
        }
    }

    #[tokio::test]
    async fn recommendation_ignores_persons_and_low_ratings() {
        let layer = SemanticLayer::new(fixtures::seeded_store().await);
        // only a person matches this text
        assert_eq!(layer.recommend("Sharon Stone").await.unwrap(), NO_RECOMMENDATION);
        // Jumanji is only rated at 3.5, which is not above the threshold
        assert_eq!(layer.recommend("Jumanji").await.unwrap(), NO_RECOMMENDATION);
    }

    #[test]
    fn tool_names_round_trip() {
        assert_eq!(Tool::from_name("search"), Some(Tool::Search));
        assert_eq!(Tool::from_name("Recommender"), Some(Tool::Recommender));
        assert_eq!(Tool::from_name("Cypher"), None);
    }
}
