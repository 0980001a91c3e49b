//! PostgreSQL repository implementations.

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::sea_query::{Expr, Func, LikeExpr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select, Set, TransactionError, TransactionTrait,
};
use uuid::Uuid;

use quill_core::domain::{Comment, Page, PageRequest, Post, Profile, User};
use quill_core::error::RepoError;
use quill_core::ports::{CommentRepository, PostRepository, ProfileRepository, UserRepository};

use super::entity::comment::{self, Entity as CommentEntity};
use super::entity::post::{self, Entity as PostEntity, Status};
use super::entity::profile::{self, Entity as ProfileEntity};
use super::entity::user::{self, Entity as UserEntity};
use super::postgres_base::{PostgresBaseRepository, map_db_err};

/// PostgreSQL user repository.
pub type PostgresUserRepository = PostgresBaseRepository<UserEntity>;

/// PostgreSQL profile repository.
pub type PostgresProfileRepository = PostgresBaseRepository<ProfileEntity>;

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

/// PostgreSQL comment repository.
pub type PostgresCommentRepository = PostgresBaseRepository<CommentEntity>;

/// Mask an email for logging to avoid PII in logs.
fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => match local.chars().next() {
            Some(first) if local.chars().count() > 1 => format!("{first}***@{domain}"),
            _ => format!("***@{domain}"),
        },
        None => "***".to_string(),
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        tracing::debug!(user_email = %mask_email(email), "Finding user by email");

        let result = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let result = UserEntity::find()
            .filter(user::Column::Id.is_in(ids.to_vec()))
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn save_with_profile(
        &self,
        user: User,
        profile: Profile,
    ) -> Result<(User, Profile), RepoError> {
        let user_id = user.id;

        self.db
            .transaction::<_, (User, Profile), DbErr>(|txn| {
                Box::pin(async move {
                    let user_row = user::ActiveModel::from(user).update(txn).await?;

                    let existing = ProfileEntity::find()
                        .filter(profile::Column::UserId.eq(user_id))
                        .one(txn)
                        .await?;

                    let mut active = profile::ActiveModel::from(profile);
                    let profile_row = match existing {
                        Some(row) => {
                            active.id = Set(row.id);
                            active.created_at = Set(row.created_at);
                            active.update(txn).await?
                        }
                        None => active.insert(txn).await?,
                    };

                    Ok((user_row.into(), profile_row.into()))
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(e) => RepoError::Connection(e.to_string()),
                TransactionError::Transaction(e) => map_db_err(e),
            })
    }
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Profile>, RepoError> {
        let result = ProfileEntity::find()
            .filter(profile::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }

    async fn get_or_create(&self, user_id: Uuid) -> Result<Profile, RepoError> {
        if let Some(existing) = self.find_by_user_id(user_id).await? {
            return Ok(existing);
        }

        tracing::debug!(%user_id, "Creating missing profile");

        // A concurrent request may create the row first; the unique user_id wins.
        ProfileEntity::insert(profile::ActiveModel::from(Profile::new(user_id)))
            .on_conflict(
                OnConflict::column(profile::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(map_db_err)?;

        self.find_by_user_id(user_id)
            .await?
            .ok_or(RepoError::NotFound)
    }
}

/// Escape LIKE wildcards so user input matches literally.
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive substring match over title OR content.
fn search_condition(query: &str) -> Condition {
    let pattern = format!("%{}%", escape_like(&query.to_lowercase()));

    Condition::any()
        .add(
            Expr::expr(Func::lower(Expr::col(post::Column::Title)))
                .like(LikeExpr::new(pattern.clone()).escape('\\')),
        )
        .add(
            Expr::expr(Func::lower(Expr::col(post::Column::Content)))
                .like(LikeExpr::new(pattern).escape('\\')),
        )
}

/// Restrict to posts published on the given UTC calendar day.
fn on_day(date: NaiveDate) -> Condition {
    Condition::all().add(post::Column::PublishedDate.eq(date))
}

impl PostgresPostRepository {
    async fn fetch_page(
        &self,
        select: Select<PostEntity>,
        request: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let paginator = select.paginate(&self.db, request.per_page);
        let total = paginator.num_items().await.map_err(map_db_err)?;
        let request = request.clamped(total);

        let rows = paginator
            .fetch_page(request.index())
            .await
            .map_err(map_db_err)?;

        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            request,
            total,
        ))
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn list_published(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let mut select = PostEntity::find().filter(post::Column::Status.eq(Status::Published));

        if let Some(query) = search.map(str::trim).filter(|q| !q.is_empty()) {
            tracing::debug!(query, "Searching published posts");
            select = select.filter(search_condition(query));
        }

        self.fetch_page(select.order_by_desc(post::Column::PublishedAt), page)
            .await
    }

    async fn find_published_by_date_slug(
        &self,
        date: NaiveDate,
        slug: &str,
    ) -> Result<Option<Post>, RepoError> {
        let result = PostEntity::find()
            .filter(post::Column::Slug.eq(slug))
            .filter(post::Column::Status.eq(Status::Published))
            .filter(on_day(date))
            .order_by_desc(post::Column::PublishedAt)
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }

    async fn find_published_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let result = PostEntity::find()
            .filter(post::Column::Slug.eq(slug))
            .filter(post::Column::Status.eq(Status::Published))
            .order_by_desc(post::Column::PublishedAt)
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }

    async fn find_by_author(
        &self,
        author_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let select = PostEntity::find()
            .filter(post::Column::AuthorId.eq(author_id))
            .order_by_desc(post::Column::CreatedAt);

        self.fetch_page(select, page).await
    }

    async fn slug_exists(
        &self,
        slug: &str,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepoError> {
        let mut select = PostEntity::find()
            .filter(post::Column::Slug.eq(slug))
            .filter(on_day(date));

        if let Some(id) = exclude {
            select = select.filter(post::Column::Id.ne(id));
        }

        let count = select.count(&self.db).await.map_err(map_db_err)?;
        Ok(count > 0)
    }
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn find_active_by_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let result = CommentEntity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::Active.eq(true))
            .order_by_asc(comment::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn set_active(&self, ids: &[Uuid], active: bool) -> Result<u64, RepoError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = CommentEntity::update_many()
            .col_expr(comment::Column::Active, Expr::value(active))
            .filter(comment::Column::Id.is_in(ids.to_vec()))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        tracing::info!(
            matched = result.rows_affected,
            active,
            "Comment moderation flag updated"
        );

        Ok(result.rows_affected)
    }
}
