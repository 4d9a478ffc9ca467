use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Articles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Articles::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Articles::ArticleId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    // normalized url
                    .col(ColumnDef::new(Articles::Url).text().not_null().unique_key())
                    .col(ColumnDef::new(Articles::UrlOriginal).text().not_null())
                    .col(ColumnDef::new(Articles::UrlHash).string_len(64).null())
                    .col(ColumnDef::new(Articles::Domain).string().null())
                    .col(ColumnDef::new(Articles::Source).string().not_null())
                    .col(ColumnDef::new(Articles::Category).string().not_null())
                    .col(ColumnDef::new(Articles::Priority).string().not_null())
                    .col(ColumnDef::new(Articles::Status).string().not_null())
                    .col(ColumnDef::new(Articles::Title).text().null())
                    .col(ColumnDef::new(Articles::Content).text().null())
                    .col(ColumnDef::new(Articles::ScrapeStatus).string().not_null())
                    .col(ColumnDef::new(Articles::ScrapeError).text().null())
                    .col(
                        ColumnDef::new(Articles::Attempts)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Articles::ScrapedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Articles::Enriched)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Articles::UserId).string().not_null())
                    .col(
                        ColumnDef::new(Articles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Articles::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Articles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden, Clone, Copy)]
pub enum Articles {
    Table,
    Id,
    ArticleId,
    Url,
    UrlOriginal,
    UrlHash,
    Domain,
    Source,
    Category,
    Priority,
    Status,
    Title,
    Content,
    ScrapeStatus,
    ScrapeError,
    Attempts,
    ScrapedAt,
    Enriched,
    UserId,
    CreatedAt,
    UpdatedAt,
}
