use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "directed")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub person_name: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub movie_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
