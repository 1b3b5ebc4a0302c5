//! Small movie graph shared by the store-backed tests.

use crate::{db, graph::GraphStore, loader};

pub const MOVIES_CSV: &str = "movieId,released,title,actors,director,genres,imdbRating
1,1995-11-22,Toy Story,Tim Allen|Tom Hanks,John Lasseter,Adventure|Animation|Children|Comedy|Fantasy,8.3
2,1995-12-15,Jumanji,Kirsten Dunst|Robin Williams,Joe Johnston,Adventure|Children|Fantasy,6.9
6,1995-12-15,Heat,Al Pacino|Robert De Niro|Val Kilmer,Michael Mann,Action|Crime|Thriller,8.2
16,1995-11-22,Casino,Joe Pesci|Robert De Niro|Sharon Stone,Martin Scorsese,Crime|Drama,8.2
110,1995-05-24,Braveheart,Mel Gibson|Sophie Marceau,Mel Gibson,Action|Drama|War,8.4
99,,Untitled Project,,,,
";

pub const RATINGS_CSV: &str = "userId,movieId,rating,timestamp
1,16,5.0,964982703
1,6,4.5,964981247
1,110,4.0,964982224
1,1,4.0,964982931
1,99,5.0,964983815
2,16,4.0,835355493
2,6,4.0,835355681
2,110,5.0,835355532
2,2,3.5,835355604
3,16,4.5,1106635946
3,6,5.0,1106635993
3,2,2.0,1106636120
3,99,4.5,1106636050
4,16,3.0,1510577970
4,1,5.0,1510577998
4,6,5.0,1510578011
5,4242,4.0,1510578100
";

pub async fn seeded_store() -> GraphStore {
    let graph = GraphStore::new(db::memory().await);
    loader::load(&graph, MOVIES_CSV, RATINGS_CSV, loader::RATINGS_BATCH_SIZE)
        .await
        .expect("fixture load");
    graph
}
