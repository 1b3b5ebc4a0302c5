use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Directed::Table)
                    .if_not_exists()
                    .col(string(Directed::PersonName))
                    .col(big_integer(Directed::MovieId))
                    .primary_key(
                        Index::create()
                            .name("pk_directed")
                            .col(Directed::PersonName)
                            .col(Directed::MovieId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_directed_person")
                            .from(Directed::Table, Directed::PersonName)
                            .to(Person::Table, Person::Name),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_directed_movie")
                            .from(Directed::Table, Directed::MovieId)
                            .to(Movie::Table, Movie::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_directed_movie")
                    .table(Directed::Table)
                    .col(Directed::MovieId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActedIn::Table)
                    .if_not_exists()
                    .col(string(ActedIn::PersonName))
                    .col(big_integer(ActedIn::MovieId))
                    .primary_key(
                        Index::create()
                            .name("pk_acted_in")
                            .col(ActedIn::PersonName)
                            .col(ActedIn::MovieId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_acted_in_person")
                            .from(ActedIn::Table, ActedIn::PersonName)
                            .to(Person::Table, Person::Name),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_acted_in_movie")
                            .from(ActedIn::Table, ActedIn::MovieId)
                            .to(Movie::Table, Movie::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_acted_in_movie")
                    .table(ActedIn::Table)
                    .col(ActedIn::MovieId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HasGenre::Table)
                    .if_not_exists()
                    .col(big_integer(HasGenre::MovieId))
                    .col(string(HasGenre::GenreName))
                    .primary_key(
                        Index::create()
                            .name("pk_has_genre")
                            .col(HasGenre::MovieId)
                            .col(HasGenre::GenreName),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_has_genre_movie")
                            .from(HasGenre::Table, HasGenre::MovieId)
                            .to(Movie::Table, Movie::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_has_genre_genre")
                            .from(HasGenre::Table, HasGenre::GenreName)
                            .to(Genre::Table, Genre::Name),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Rated::Table)
                    .if_not_exists()
                    .col(big_integer(Rated::UserId))
                    .col(big_integer(Rated::MovieId))
                    .col(double(Rated::Rating))
                    .col(big_integer(Rated::Timestamp))
                    .primary_key(
                        Index::create().name("pk_rated").col(Rated::UserId).col(Rated::MovieId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rated_user")
                            .from(Rated::Table, Rated::UserId)
                            .to(AppUser::Table, AppUser::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rated_movie")
                            .from(Rated::Table, Rated::MovieId)
                            .to(Movie::Table, Movie::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // co-rating lookups start from the movie side
        manager
            .create_index(
                Index::create()
                    .name("idx_rated_movie_rating")
                    .table(Rated::Table)
                    .col(Rated::MovieId)
                    .col(Rated::Rating)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Rated::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(HasGenre::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(ActedIn::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Directed::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Person {
    Table,
    Name,
}

#[derive(DeriveIden)]
enum Genre {
    Table,
    Name,
}

#[derive(DeriveIden)]
enum AppUser {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Directed {
    Table,
    PersonName,
    MovieId,
}

#[derive(DeriveIden)]
enum ActedIn {
    Table,
    PersonName,
    MovieId,
}

#[derive(DeriveIden)]
enum HasGenre {
    Table,
    MovieId,
    GenreName,
}

#[derive(DeriveIden)]
enum Rated {
    Table,
    UserId,
    MovieId,
    Rating,
    Timestamp,
}
