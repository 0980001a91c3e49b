use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_user_table::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Post::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Post::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Post::AuthorId).uuid().not_null())
                    .col(ColumnDef::new(Post::Title).string_len(250).not_null())
                    .col(ColumnDef::new(Post::Slug).string_len(250).not_null())
                    .col(ColumnDef::new(Post::Content).text().not_null())
                    .col(
                        ColumnDef::new(Post::Status)
                            .string_len(10)
                            .not_null()
                            .default("published"),
                    )
                    .col(
                        ColumnDef::new(Post::PublishedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Post::PublishedDate).date().not_null())
                    .col(
                        ColumnDef::new(Post::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Post::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_posts_author_id")
                            .from(Post::Table, Post::AuthorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Public listing: published posts, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_posts_status_published_at")
                    .table(Post::Table)
                    .col(Post::Status)
                    .col(Post::PublishedAt)
                    .to_owned(),
            )
            .await?;

        // A slug is unique per publication day; also serves the date+slug lookup
        manager
            .create_index(
                Index::create()
                    .name("idx_posts_slug_published_date")
                    .table(Post::Table)
                    .col(Post::Slug)
                    .col(Post::PublishedDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_posts_author_id_created_at")
                    .table(Post::Table)
                    .col(Post::AuthorId)
                    .col(Post::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Post::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Post {
    #[sea_orm(iden = "posts")]
    Table,
    Id,
    AuthorId,
    Title,
    Slug,
    Content,
    Status,
    PublishedAt,
    PublishedDate,
    CreatedAt,
    UpdatedAt,
}
