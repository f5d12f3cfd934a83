use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WeatherRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WeatherRecords::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WeatherRecords::City).string().not_null())
                    .col(ColumnDef::new(WeatherRecords::Country).string().null())
                    .col(ColumnDef::new(WeatherRecords::Temperature).double().not_null())
                    .col(ColumnDef::new(WeatherRecords::Humidity).integer().not_null())
                    .col(ColumnDef::new(WeatherRecords::WindSpeed).double().not_null())
                    .col(ColumnDef::new(WeatherRecords::Pressure).integer().not_null())
                    .col(ColumnDef::new(WeatherRecords::Description).string().not_null())
                    .col(ColumnDef::new(WeatherRecords::Icon).string().not_null())
                    .col(
                        ColumnDef::new(WeatherRecords::ObservedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ScheduleEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduleEntries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ScheduleEntries::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ScheduleEntries::Job).string().not_null())
                    .col(ColumnDef::new(ScheduleEntries::Minute).string().not_null())
                    .col(ColumnDef::new(ScheduleEntries::Hour).string().not_null())
                    .col(ColumnDef::new(ScheduleEntries::DayOfWeek).string().not_null())
                    .col(ColumnDef::new(ScheduleEntries::DayOfMonth).string().not_null())
                    .col(ColumnDef::new(ScheduleEntries::MonthOfYear).string().not_null())
                    .col(
                        ColumnDef::new(ScheduleEntries::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ScheduleEntries::Args).string().null())
                    .col(ColumnDef::new(ScheduleEntries::Queue).string().null())
                    .col(
                        ColumnDef::new(ScheduleEntries::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ScheduleEntries::LastEnqueuedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ScheduleEntries::TotalEnqueued)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScheduleEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduleEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(JobRuns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JobRuns::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(JobRuns::Job).string().not_null())
                    .col(ColumnDef::new(JobRuns::Args).string().not_null())
                    .col(ColumnDef::new(JobRuns::Status).string().not_null())
                    .col(ColumnDef::new(JobRuns::ProgressCurrent).integer().null())
                    .col(ColumnDef::new(JobRuns::ProgressTotal).integer().null())
                    .col(ColumnDef::new(JobRuns::Result).string().null())
                    .col(ColumnDef::new(JobRuns::Error).string().null())
                    .col(ColumnDef::new(JobRuns::Queue).string().null())
                    .col(ColumnDef::new(JobRuns::ScheduleName).string().null())
                    .col(
                        ColumnDef::new(JobRuns::EnqueuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(JobRuns::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(JobRuns::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(JobRuns::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobRuns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ScheduleEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WeatherRecords::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum WeatherRecords {
    Table,
    Id,
    City,
    Country,
    Temperature,
    Humidity,
    WindSpeed,
    Pressure,
    Description,
    Icon,
    ObservedAt,
}

#[derive(Iden)]
enum ScheduleEntries {
    Table,
    Id,
    Name,
    Job,
    Minute,
    Hour,
    DayOfWeek,
    DayOfMonth,
    MonthOfYear,
    Enabled,
    Args,
    Queue,
    ExpiresAt,
    LastEnqueuedAt,
    TotalEnqueued,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum JobRuns {
    Table,
    Id,
    Job,
    Args,
    Status,
    ProgressCurrent,
    ProgressTotal,
    Result,
    Error,
    Queue,
    ScheduleName,
    EnqueuedAt,
    StartedAt,
    FinishedAt,
    ExpiresAt,
}
