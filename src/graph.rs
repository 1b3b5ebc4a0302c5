use std::sync::Arc;

use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, QuerySelect};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    entities::{acted_in, app_user, directed, genre, has_genre, movie, person, rated},
    error::AppResult,
    fulltext::EntityIndex,
    models::{GraphStats, NodeKey},
};

// stays well below SQLite's bound-parameter limit for the widest table (rated: 4 columns)
pub const INSERT_CHUNK: usize = 500;

/// Property-graph store: node and relationship tables plus the entity index.
#[derive(Clone)]
pub struct GraphStore {
    db: DatabaseConnection,
    index: Arc<RwLock<Arc<EntityIndex>>>,
}

impl GraphStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, index: Arc::new(RwLock::new(Arc::new(EntityIndex::new()))) }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn index(&self) -> Arc<EntityIndex> {
        self.index.read().await.clone()
    }

    /// Rebuilds the entity index from the current `Person` and `Movie` rows.
    pub async fn refresh_index(&self) -> AppResult<usize> {
        let mut idx = EntityIndex::new();

        let persons: Vec<String> = person::Entity::find()
            .select_only()
            .column(person::Column::Name)
            .into_tuple()
            .all(&self.db)
            .await?;
        for name in persons {
            idx.insert(NodeKey::Person(name.clone()), name);
        }

        let movies: Vec<(i64, String)> = movie::Entity::find()
            .select_only()
            .column(movie::Column::Id)
            .column(movie::Column::Title)
            .into_tuple()
            .all(&self.db)
            .await?;
        for (id, title) in movies {
            idx.insert(NodeKey::Movie(id), title);
        }

        let size = idx.len();
        *self.index.write().await = Arc::new(idx);
        info!(documents = size, "entity index refreshed");
        Ok(size)
    }

    pub async fn movie_ids(&self) -> AppResult<Vec<i64>> {
        let ids = movie::Entity::find()
            .select_only()
            .column(movie::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(ids)
    }

    pub async fn stats(&self) -> AppResult<GraphStats> {
        Ok(GraphStats {
            movies: movie::Entity::find().count(&self.db).await?,
            persons: person::Entity::find().count(&self.db).await?,
            genres: genre::Entity::find().count(&self.db).await?,
            users: app_user::Entity::find().count(&self.db).await?,
            directed: directed::Entity::find().count(&self.db).await?,
            acted_in: acted_in::Entity::find().count(&self.db).await?,
            has_genre: has_genre::Entity::find().count(&self.db).await?,
            rated: rated::Entity::find().count(&self.db).await?,
        })
    }
}

/// Merge-on-key upserts. Each takes the connection or transaction to write through.
pub mod merge {
    use sea_orm::{ConnectionTrait, Set, sea_query::OnConflict};

    use super::*;

    pub async fn movies<C: ConnectionTrait>(conn: &C, rows: Vec<movie::ActiveModel>) -> AppResult<()> {
        for chunk in chunked(rows) {
            movie::Entity::insert_many(chunk)
                .on_conflict(
                    OnConflict::column(movie::Column::Id)
                        .update_columns([
                            movie::Column::Title,
                            movie::Column::Released,
                            movie::Column::ImdbRating,
                        ])
                        .to_owned(),
                )
                .exec(conn)
                .await?;
        }
        Ok(())
    }

    pub async fn persons<C: ConnectionTrait>(conn: &C, names: Vec<String>) -> AppResult<()> {
        let rows: Vec<person::ActiveModel> =
            names.into_iter().map(|name| person::ActiveModel { name: Set(name) }).collect();
        for chunk in chunked(rows) {
            person::Entity::insert_many(chunk)
                .on_conflict(OnConflict::column(person::Column::Name).do_nothing().to_owned())
                .do_nothing()
                .exec(conn)
                .await?;
        }
        Ok(())
    }

    pub async fn genres<C: ConnectionTrait>(conn: &C, names: Vec<String>) -> AppResult<()> {
        let rows: Vec<genre::ActiveModel> =
            names.into_iter().map(|name| genre::ActiveModel { name: Set(name) }).collect();
        for chunk in chunked(rows) {
            genre::Entity::insert_many(chunk)
                .on_conflict(OnConflict::column(genre::Column::Name).do_nothing().to_owned())
                .do_nothing()
                .exec(conn)
                .await?;
        }
        Ok(())
    }

    pub async fn users<C: ConnectionTrait>(conn: &C, ids: Vec<i64>) -> AppResult<()> {
        let rows: Vec<app_user::ActiveModel> =
            ids.into_iter().map(|id| app_user::ActiveModel { id: Set(id) }).collect();
        for chunk in chunked(rows) {
            app_user::Entity::insert_many(chunk)
                .on_conflict(OnConflict::column(app_user::Column::Id).do_nothing().to_owned())
                .do_nothing()
                .exec(conn)
                .await?;
        }
        Ok(())
    }

    pub async fn directed<C: ConnectionTrait>(conn: &C, edges: Vec<(String, i64)>) -> AppResult<()> {
        let rows: Vec<directed::ActiveModel> = edges
            .into_iter()
            .map(|(person_name, movie_id)| directed::ActiveModel {
                person_name: Set(person_name),
                movie_id: Set(movie_id),
            })
            .collect();
        for chunk in chunked(rows) {
            directed::Entity::insert_many(chunk)
                .on_conflict(
                    OnConflict::columns([directed::Column::PersonName, directed::Column::MovieId])
                        .do_nothing()
                        .to_owned(),
                )
                .do_nothing()
                .exec(conn)
                .await?;
        }
        Ok(())
    }

    pub async fn acted_in<C: ConnectionTrait>(conn: &C, edges: Vec<(String, i64)>) -> AppResult<()> {
        let rows: Vec<acted_in::ActiveModel> = edges
            .into_iter()
            .map(|(person_name, movie_id)| acted_in::ActiveModel {
                person_name: Set(person_name),
                movie_id: Set(movie_id),
            })
            .collect();
        for chunk in chunked(rows) {
            acted_in::Entity::insert_many(chunk)
                .on_conflict(
                    OnConflict::columns([acted_in::Column::PersonName, acted_in::Column::MovieId])
                        .do_nothing()
                        .to_owned(),
                )
                .do_nothing()
                .exec(conn)
                .await?;
        }
        Ok(())
    }

    pub async fn has_genre<C: ConnectionTrait>(conn: &C, edges: Vec<(i64, String)>) -> AppResult<()> {
        let rows: Vec<has_genre::ActiveModel> = edges
            .into_iter()
            .map(|(movie_id, genre_name)| has_genre::ActiveModel {
                movie_id: Set(movie_id),
                genre_name: Set(genre_name),
            })
            .collect();
        for chunk in chunked(rows) {
            has_genre::Entity::insert_many(chunk)
                .on_conflict(
                    OnConflict::columns([has_genre::Column::MovieId, has_genre::Column::GenreName])
                        .do_nothing()
                        .to_owned(),
                )
                .do_nothing()
                .exec(conn)
                .await?;
        }
        Ok(())
    }

    pub async fn ratings<C: ConnectionTrait>(conn: &C, rows: Vec<rated::ActiveModel>) -> AppResult<()> {
        for chunk in chunked(rows) {
            rated::Entity::insert_many(chunk)
                .on_conflict(
                    OnConflict::columns([rated::Column::UserId, rated::Column::MovieId])
                        .update_columns([rated::Column::Rating, rated::Column::Timestamp])
                        .to_owned(),
                )
                .exec(conn)
                .await?;
        }
        Ok(())
    }

    fn chunked<T>(mut rows: Vec<T>) -> Vec<Vec<T>> {
        let mut out = Vec::with_capacity(rows.len().div_ceil(INSERT_CHUNK));
        while !rows.is_empty() {
            let rest = rows.split_off(rows.len().min(INSERT_CHUNK));
            out.push(std::mem::replace(&mut rows, rest));
        }
        debug!(chunks = out.len(), "split insert into chunks");
        out
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Set;

    use super::*;
    use crate::db;

    fn casino() -> movie::ActiveModel {
        movie::ActiveModel {
            id: Set(16),
            title: Set("Casino".to_string()),
            released: Set(Some("1995-11-22".to_string())),
            imdb_rating: Set(Some(8.2)),
        }
    }

    #[tokio::test]
    async fn node_merges_are_idempotent() {
        let store = GraphStore::new(db::memory().await);
        let conn = store.db();

        for _ in 0..2 {
            merge::movies(conn, vec![casino()]).await.unwrap();
            merge::persons(conn, vec!["Joe Pesci".into(), "Joe Pesci".into()]).await.unwrap();
            merge::genres(conn, vec!["Crime".into()]).await.unwrap();
            merge::acted_in(conn, vec![("Joe Pesci".into(), 16)]).await.unwrap();
            merge::has_genre(conn, vec![(16, "Crime".into())]).await.unwrap();
        }

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.movies, 1);
        assert_eq!(stats.persons, 1);
        assert_eq!(stats.genres, 1);
        assert_eq!(stats.acted_in, 1);
        assert_eq!(stats.has_genre, 1);
    }

    #[tokio::test]
    async fn rating_merge_overwrites_properties() {
        let store = GraphStore::new(db::memory().await);
        let conn = store.db();
        merge::movies(conn, vec![casino()]).await.unwrap();
        merge::users(conn, vec![7]).await.unwrap();

        for (rating, ts) in [(3.0, 100), (4.5, 200)] {
            let row = rated::ActiveModel {
                user_id: Set(7),
                movie_id: Set(16),
                rating: Set(rating),
                timestamp: Set(ts),
            };
            merge::ratings(conn, vec![row]).await.unwrap();
        }

        let rows = rated::Entity::find().all(conn).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rating, 4.5);
        assert_eq!(rows[0].timestamp, 200);
    }

    #[tokio::test]
    async fn chunked_inserts_cover_every_row() {
        let store = GraphStore::new(db::memory().await);
        let names: Vec<String> = (0..INSERT_CHUNK * 2 + 3).map(|i| format!("Person {i}")).collect();
        merge::persons(store.db(), names).await.unwrap();
        assert_eq!(store.stats().await.unwrap().persons, (INSERT_CHUNK * 2 + 3) as u64);
    }

    #[tokio::test]
    async fn index_refresh_picks_up_new_nodes() {
        let store = GraphStore::new(db::memory().await);
        assert!(store.index().await.is_empty());

        merge::movies(store.db(), vec![casino()]).await.unwrap();
        merge::persons(store.db(), vec!["Sharon Stone".into()]).await.unwrap();

        assert_eq!(store.refresh_index().await.unwrap(), 2);
        assert_eq!(store.index().await.len(), 2);
    }
}
