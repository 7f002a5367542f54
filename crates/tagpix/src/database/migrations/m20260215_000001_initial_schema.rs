use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create tables in order of dependencies
        self.create_partitions_table(manager).await?;
        self.create_images_table(manager).await?;
        self.create_tags_table(manager).await?;
        self.create_image_tags_table(manager).await?;
        self.create_random_sessions_table(manager).await?;

        // Create indexes
        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order
        manager
            .drop_table(Table::drop().table(RandomSessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ImageTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Images::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Partitions::Table).to_owned())
            .await?;

        Ok(())
    }
}

impl Migration {
    // Helper functions for database-specific types
    fn create_uuid_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.uuid().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn create_timestamp_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn create_nullable_timestamp_column(
        &self,
        manager: &SchemaManager,
        column: impl IntoIden,
    ) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone(),
            _ => col.string(),
        };
        col
    }

    // Table creation methods
    async fn create_partitions_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Partitions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Partitions::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Partitions::FolderName).string().not_null())
                    .col(self.create_timestamp_column(manager, Partitions::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_images_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Images::Table)
                    .if_not_exists()
                    .col(self.create_uuid_column(manager, Images::Id).primary_key())
                    .col(ColumnDef::new(Images::PartitionId).integer().not_null())
                    .col(ColumnDef::new(Images::FileName).string().not_null())
                    .col(ColumnDef::new(Images::Title).string().not_null())
                    .col(
                        ColumnDef::new(Images::ContentHash)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(self.create_timestamp_column(manager, Images::CreatedAt))
                    .col(self.create_timestamp_column(manager, Images::UpdatedAt))
                    .col(self.create_nullable_timestamp_column(manager, Images::RemovedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_images_partition_id")
                            .from(Images::Table, Images::PartitionId)
                            .to(Partitions::Table, Partitions::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_tags_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tags::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Tags::Title)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(self.create_timestamp_column(manager, Tags::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_image_tags_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ImageTags::Table)
                    .if_not_exists()
                    .col(self.create_uuid_column(manager, ImageTags::ImageId))
                    .col(ColumnDef::new(ImageTags::TagId).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(ImageTags::ImageId)
                            .col(ImageTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_image_tags_image_id")
                            .from(ImageTags::Table, ImageTags::ImageId)
                            .to(Images::Table, Images::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_image_tags_tag_id")
                            .from(ImageTags::Table, ImageTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_random_sessions_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RandomSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RandomSessions::Fingerprint)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RandomSessions::ChosenIndex)
                            .big_integer()
                            .not_null(),
                    )
                    .col(self.create_timestamp_column(manager, RandomSessions::ExpiresAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        // Selection orders by creation time; keep that scan cheap.
        manager
            .create_index(
                Index::create()
                    .name("idx_images_created_at")
                    .table(Images::Table)
                    .col(Images::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_images_partition_id")
                    .table(Images::Table)
                    .col(Images::PartitionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_image_tags_tag_id")
                    .table(ImageTags::Table)
                    .col(ImageTags::TagId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_random_sessions_expires_at")
                    .table(RandomSessions::Table)
                    .col(RandomSessions::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Partitions {
    Table,
    Id,
    FolderName,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Images {
    Table,
    Id,
    PartitionId,
    FileName,
    Title,
    ContentHash,
    CreatedAt,
    UpdatedAt,
    RemovedAt,
}

#[derive(DeriveIden)]
enum Tags {
    Table,
    Id,
    Title,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ImageTags {
    Table,
    ImageId,
    TagId,
}

#[derive(DeriveIden)]
enum RandomSessions {
    Table,
    Fingerprint,
    ChosenIndex,
    ExpiresAt,
}
