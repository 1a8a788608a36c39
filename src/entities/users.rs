use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub username: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id password hash. Accounts created through OAuth have none.
    pub password_hash: Option<String>,

    pub email_verified: bool,

    /// Pending email verification code
    pub verification_code: Option<String>,

    pub avatar_id: Option<Uuid>,

    pub created_at: DateTimeUtc,

    pub last_verification_sent: Option<DateTimeUtc>,

    pub code_expires_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::prediction_history::Entity")]
    PredictionHistory,
}

impl Related<super::prediction_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PredictionHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
