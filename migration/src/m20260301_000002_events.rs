//! Append-only events table.
//!
//! The UNIQUE index on `dedup_key` is what makes deduplication atomic: the
//! first insert of a `(kind, subject, session_token)` triple wins, every
//! concurrent or later insert of the same key conflicts and is recorded as
//! a duplicate instead. There is no separate check-then-insert.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Events::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Events::LinkId).string_len(64).not_null())
                    .col(ColumnDef::new(Events::DestinationId).string_len(64).null())
                    .col(ColumnDef::new(Events::UserId).string_len(64).not_null())
                    .col(ColumnDef::new(Events::Kind).string_len(8).not_null())
                    .col(
                        ColumnDef::new(Events::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Events::IpAddress).string_len(45).null())
                    .col(ColumnDef::new(Events::ClientDescriptor).text().null())
                    .col(ColumnDef::new(Events::Referrer).text().null())
                    .col(
                        ColumnDef::new(Events::Country)
                            .string_len(64)
                            .not_null()
                            .default("Unknown"),
                    )
                    .col(ColumnDef::new(Events::Region).string_len(100).null())
                    .col(ColumnDef::new(Events::City).string_len(100).null())
                    .col(ColumnDef::new(Events::Latitude).double().null())
                    .col(ColumnDef::new(Events::Longitude).double().null())
                    .col(ColumnDef::new(Events::Browser).string_len(64).null())
                    .col(ColumnDef::new(Events::Os).string_len(64).null())
                    .col(ColumnDef::new(Events::DeviceClass).string_len(16).null())
                    .col(ColumnDef::new(Events::SessionToken).string_len(128).null())
                    .col(
                        ColumnDef::new(Events::ScreenResolution)
                            .string_len(16)
                            .null(),
                    )
                    .col(ColumnDef::new(Events::Locale).string_len(16).null())
                    .col(ColumnDef::new(Events::Timezone).string_len(64).null())
                    .col(
                        ColumnDef::new(Events::IsDuplicate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Events::DedupKey).string_len(255).null())
                    .to_owned(),
            )
            .await?;

        // First-write-wins dedup constraint
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_events_dedup_key")
                    .table(Events::Table)
                    .col(Events::DedupKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Per-link time-series queries
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_link_time")
                    .table(Events::Table)
                    .col(Events::LinkId)
                    .col(Events::OccurredAt)
                    .to_owned(),
            )
            .await?;

        // Per-user dashboard scope
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_user_time")
                    .table(Events::Table)
                    .col(Events::UserId)
                    .col(Events::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_destination_id")
                    .table(Events::Table)
                    .col(Events::DestinationId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_events_destination_id").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_events_user_time").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_events_link_time").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("uq_events_dedup_key").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Events {
    #[sea_orm(iden = "events")]
    Table,
    Id,
    LinkId,
    DestinationId,
    UserId,
    Kind,
    OccurredAt,
    IpAddress,
    ClientDescriptor,
    Referrer,
    Country,
    Region,
    City,
    Latitude,
    Longitude,
    Browser,
    Os,
    DeviceClass,
    SessionToken,
    ScreenResolution,
    Locale,
    Timezone,
    IsDuplicate,
    DedupKey,
}
