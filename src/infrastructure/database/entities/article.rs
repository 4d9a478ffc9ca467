// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::article::ScrapeOutcome;
use crate::utils::errors::StoreError;
use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub article_id: String,
    #[sea_orm(column_type = "Text", unique)]
    pub url: String,
    #[sea_orm(column_type = "Text")]
    pub url_original: String,
    pub url_hash: Option<String>,
    pub domain: Option<String>,
    pub source: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub title: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,
    pub scrape_status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub scrape_error: Option<String>,
    pub attempts: i32,
    pub scraped_at: ChronoDateTimeWithTimeZone,
    pub enriched: bool,
    pub user_id: String,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub updated_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ScrapeOutcome {
    type Error = StoreError;

    fn try_from(m: Model) -> Result<Self, Self::Error> {
        let status = m
            .status
            .parse()
            .map_err(|_| StoreError::Serialization(format!("unknown status '{}'", m.status)))?;
        let scrape_status = m.scrape_status.parse().map_err(|_| {
            StoreError::Serialization(format!("unknown scrape_status '{}'", m.scrape_status))
        })?;

        Ok(ScrapeOutcome {
            article_id: m.article_id,
            url: m.url,
            url_original: m.url_original,
            url_hash: m.url_hash,
            domain: m.domain,
            source: m.source,
            category: m.category,
            priority: m.priority.parse().unwrap_or_default(),
            status,
            title: m.title,
            content: m.content,
            scrape_status,
            scrape_error: m.scrape_error,
            scraped_at: m.scraped_at.into(),
            enriched: m.enriched,
            user_id: m.user_id,
            attempts: m.attempts.max(0) as u32,
            created_at: m.created_at.into(),
            updated_at: m.updated_at.into(),
        })
    }
}
