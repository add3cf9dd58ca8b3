use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::DisplayName).string().not_null())
                    // no FK: users may briefly point at a couple being dissolved
                    .col(ColumnDef::new(Users::CoupleId).string().null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MatchRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MatchRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MatchRequests::SenderId).uuid().not_null())
                    .col(ColumnDef::new(MatchRequests::ReceiverId).uuid().not_null())
                    .col(ColumnDef::new(MatchRequests::ReceiverEmail).string().not_null())
                    .col(ColumnDef::new(MatchRequests::AnniversaryDate).date().not_null())
                    .col(ColumnDef::new(MatchRequests::Message).text().null())
                    .col(ColumnDef::new(MatchRequests::Status).string_len(16).not_null())
                    .col(
                        ColumnDef::new(MatchRequests::PendingKey)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(MatchRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MatchRequests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MatchRequests::RespondedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Couples::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Couples::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Couples::MemberA).uuid().not_null())
                    .col(ColumnDef::new(Couples::MemberB).uuid().not_null())
                    .col(ColumnDef::new(Couples::RequestId).uuid().not_null())
                    .col(
                        ColumnDef::new(Couples::MatchedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Couples::AnniversaryDate).date().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PurgeJournal::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurgeJournal::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PurgeJournal::CoupleId).string().not_null())
                    .col(ColumnDef::new(PurgeJournal::MemberA).uuid().not_null())
                    .col(ColumnDef::new(PurgeJournal::MemberB).uuid().not_null())
                    .col(ColumnDef::new(PurgeJournal::RequestedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(PurgeJournal::RequestedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PurgeJournal::Purged).text().not_null())
                    .col(
                        ColumnDef::new(PurgeJournal::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CoupleEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CoupleEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CoupleEvents::CoupleId).string().not_null())
                    .col(ColumnDef::new(CoupleEvents::Title).string().not_null())
                    .col(
                        ColumnDef::new(CoupleEvents::StartsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CoupleEvents::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(CoupleEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CouplePhotos::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CouplePhotos::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CouplePhotos::CoupleId).string().not_null())
                    .col(ColumnDef::new(CouplePhotos::ObjectKey).string().not_null())
                    .col(ColumnDef::new(CouplePhotos::UploadedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(CouplePhotos::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_couple_id")
                    .table(Users::Table)
                    .col(Users::CoupleId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_match_requests_sender_id")
                    .table(MatchRequests::Table)
                    .col(MatchRequests::SenderId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_match_requests_receiver_id")
                    .table(MatchRequests::Table)
                    .col(MatchRequests::ReceiverId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_purge_journal_couple_id")
                    .table(PurgeJournal::Table)
                    .col(PurgeJournal::CoupleId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_couple_events_couple_id")
                    .table(CoupleEvents::Table)
                    .col(CoupleEvents::CoupleId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_couple_photos_couple_id")
                    .table(CouplePhotos::Table)
                    .col(CouplePhotos::CoupleId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CouplePhotos::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CoupleEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PurgeJournal::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Couples::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MatchRequests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    DisplayName,
    CoupleId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum MatchRequests {
    Table,
    Id,
    SenderId,
    ReceiverId,
    ReceiverEmail,
    AnniversaryDate,
    Message,
    Status,
    PendingKey,
    CreatedAt,
    UpdatedAt,
    RespondedAt,
}

#[derive(DeriveIden)]
enum Couples {
    Table,
    Id,
    MemberA,
    MemberB,
    RequestId,
    MatchedAt,
    AnniversaryDate,
}

#[derive(DeriveIden)]
enum PurgeJournal {
    Table,
    Id,
    CoupleId,
    MemberA,
    MemberB,
    RequestedBy,
    RequestedAt,
    Purged,
    CompletedAt,
}

#[derive(DeriveIden)]
enum CoupleEvents {
    Table,
    Id,
    CoupleId,
    Title,
    StartsAt,
    CreatedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CouplePhotos {
    Table,
    Id,
    CoupleId,
    ObjectKey,
    UploadedBy,
    CreatedAt,
}
