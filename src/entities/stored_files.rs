use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "stored_files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Generated unique name, `<uuid>.<ext>`
    #[sea_orm(unique)]
    pub filename: String,

    pub original_name: String,

    pub content_type: String,

    /// `avatar` or `prediction_image`
    pub kind: String,

    pub owner_id: Option<Uuid>,

    pub size: i64,

    #[sea_orm(column_type = "Blob")]
    pub data: Vec<u8>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
