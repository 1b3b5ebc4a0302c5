use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Movie,
    Person,
}

impl NodeLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeLabel::Movie => "Movie",
            NodeLabel::Person => "Person",
        }
    }
}

/// Unique key of a node reachable through the entity index.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(untagged)]
pub enum NodeKey {
    Movie(i64),
    Person(String),
}

impl NodeKey {
    pub fn label(&self) -> NodeLabel {
        match self {
            NodeKey::Movie(_) => NodeLabel::Movie,
            NodeKey::Person(_) => NodeLabel::Person,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub enum RelType {
    Directed,
    ActedIn,
    HasGenre,
    Rated,
}

impl RelType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelType::Directed => "DIRECTED",
            RelType::ActedIn => "ACTED_IN",
            RelType::HasGenre => "HAS_GENRE",
            RelType::Rated => "RATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DIRECTED" => Some(RelType::Directed),
            "ACTED_IN" => Some(RelType::ActedIn),
            "HAS_GENRE" => Some(RelType::HasGenre),
            "RATED" => Some(RelType::Rated),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RelationGroup {
    pub rel_type: RelType,
    pub names: Vec<String>,
}

/// A resolved node with its one-hop neighbourhood, grouped by relationship.
#[derive(Clone, Debug, Serialize)]
pub struct EntityContext {
    pub label: NodeLabel,
    pub key: NodeKey,
    pub title: String,
    pub year: Option<i16>,
    pub groups: Vec<RelationGroup>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Recommendation {
    pub title: String,
    pub co_ratings: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MovieRecord {
    #[serde(rename = "movieId")]
    pub movie_id: i64,
    #[serde(default)]
    pub released: Option<String>,
    pub title: String,
    #[serde(default)]
    pub actors: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub genres: Option<String>,
    #[serde(rename = "imdbRating", default)]
    pub imdb_rating: Option<f64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RatingRecord {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "movieId")]
    pub movie_id: i64,
    pub rating: f64,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct LoadReport {
    pub movies: usize,
    pub ratings_read: usize,
    pub ratings_skipped: usize,
    pub batches: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct GraphStats {
    pub movies: u64,
    pub persons: u64,
    pub genres: u64,
    pub users: u64,
    pub directed: u64,
    pub acted_in: u64,
    pub has_genre: u64,
    pub rated: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Deserialize)]
pub struct ToolQuery {
    pub q: String,
}
