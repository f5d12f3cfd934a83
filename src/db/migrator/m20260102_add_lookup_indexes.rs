use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // History reads and cleanup both scan by observation time
        manager
            .create_index(
                Index::create()
                    .name("idx_weather_records_observed_at")
                    .table(WeatherRecords::Table)
                    .col(WeatherRecords::ObservedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_weather_records_city")
                    .table(WeatherRecords::Table)
                    .col(WeatherRecords::City)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_job_runs_status_enqueued")
                    .table(JobRuns::Table)
                    .col(JobRuns::Status)
                    .col(JobRuns::EnqueuedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_job_runs_status_enqueued").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_weather_records_city").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_weather_records_observed_at")
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
enum WeatherRecords {
    Table,
    City,
    ObservedAt,
}

#[derive(Iden)]
enum JobRuns {
    Table,
    Status,
    EnqueuedAt,
}
