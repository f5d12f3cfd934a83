use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "weather_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub city: String,
    pub country: Option<String>,
    pub temperature: f64,
    pub humidity: i32,
    pub wind_speed: f64,
    pub pressure: i32,
    pub description: String,
    pub icon: String,
    pub observed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
