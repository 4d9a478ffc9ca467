use sea_orm_migration::prelude::*;

use crate::m20260301_000001_create_articles::Articles;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 用户维度的复合索引（名称, 列）
const USER_INDEXES: &[(&str, &[Articles])] = &[
    ("idx_articles_user_status", &[Articles::UserId, Articles::Status]),
    ("idx_articles_user_created_at", &[Articles::UserId, Articles::CreatedAt]),
    ("idx_articles_user_category", &[Articles::UserId, Articles::Category]),
    ("idx_articles_user_priority", &[Articles::UserId, Articles::Priority]),
    ("idx_articles_user_source", &[Articles::UserId, Articles::Source]),
    (
        "idx_articles_user_status_updated_at",
        &[Articles::UserId, Articles::Status, Articles::UpdatedAt],
    ),
];

/// 单列索引
const SINGLE_INDEXES: &[(&str, Articles)] = &[
    ("idx_articles_status", Articles::Status),
    ("idx_articles_priority", Articles::Priority),
    ("idx_articles_category", Articles::Category),
    ("idx_articles_source", Articles::Source),
    ("idx_articles_created_at", Articles::CreatedAt),
    ("idx_articles_updated_at", Articles::UpdatedAt),
];

const URL_HASH_INDEX: &str = "idx_articles_url_hash";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, cols) in USER_INDEXES {
            let mut index = Index::create();
            index.name(*name).table(Articles::Table).if_not_exists();
            for col in cols.iter() {
                index.col(*col);
            }
            manager.create_index(index.to_owned()).await?;
        }

        for (name, col) in SINGLE_INDEXES {
            manager
                .create_index(
                    Index::create()
                        .name(*name)
                        .table(Articles::Table)
                        .col(*col)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
        }

        // Partial index: rows without a hash (malformed urls) stay out of it.
        // Both Postgres and SQLite accept this form.
        manager
            .get_connection()
            .execute_unprepared(&format!(
                "CREATE INDEX IF NOT EXISTS {URL_HASH_INDEX} ON articles (url_hash) WHERE url_hash IS NOT NULL"
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name(URL_HASH_INDEX).table(Articles::Table).to_owned())
            .await?;
        for (name, _) in SINGLE_INDEXES.iter().rev() {
            manager
                .drop_index(Index::drop().name(*name).table(Articles::Table).to_owned())
                .await?;
        }
        for (name, _) in USER_INDEXES.iter().rev() {
            manager
                .drop_index(Index::drop().name(*name).table(Articles::Table).to_owned())
                .await?;
        }
        Ok(())
    }
}
