use crate::entities::prediction_history;
use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());

        manager
            .create_table(
                schema
                    .create_table_from_entity(PredictionHistory)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Listing is always "one user's records, newest first"
        manager
            .create_index(
                Index::create()
                    .name("idx_prediction_history_user_created")
                    .table(PredictionHistory)
                    .col(prediction_history::Column::UserId)
                    .col(prediction_history::Column::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PredictionHistory).to_owned())
            .await
    }
}
