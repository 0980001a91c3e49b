use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::slug;
use crate::domain::{Comment, Page, PageRequest, Post, Profile, User};
use crate::error::RepoError;

/// Times a post insert is retried after losing its slug to a concurrent writer.
const SLUG_RETRIES: u32 = 3;

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Save an entity (create or update).
    async fn save(&self, entity: T) -> Result<T, RepoError>;

    /// Delete an entity by its ID.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// User repository with account lookups.
#[async_trait]
pub trait UserRepository: BaseRepository<User, Uuid> {
    /// Find a user by their email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;

    /// Find a user by their login name.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;

    /// Fetch several users at once (authors of a listing, commenters).
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, RepoError>;

    /// Persist a user and their profile in one transaction.
    ///
    /// The profile row is created when it does not exist yet.
    async fn save_with_profile(
        &self,
        user: User,
        profile: Profile,
    ) -> Result<(User, Profile), RepoError>;
}

/// Profile repository.
#[async_trait]
pub trait ProfileRepository: BaseRepository<Profile, Uuid> {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Profile>, RepoError>;

    /// Return the user's profile, creating an empty one on first access.
    async fn get_or_create(&self, user_id: Uuid) -> Result<Profile, RepoError>;
}

/// Post repository - listing, addressing and slug bookkeeping.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, Uuid> {
    /// Published posts, newest publication first, optionally filtered by a
    /// case-insensitive substring of title or content.
    async fn list_published(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError>;

    /// Published post with the given slug on the given (UTC) publication day.
    async fn find_published_by_date_slug(
        &self,
        date: NaiveDate,
        slug: &str,
    ) -> Result<Option<Post>, RepoError>;

    /// Most recently published post with the given slug, whatever its date.
    async fn find_published_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError>;

    /// All of an author's posts including drafts, newest created first.
    async fn find_by_author(
        &self,
        author_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError>;

    /// Whether `slug` is already used on `date`, ignoring the post `exclude`.
    async fn slug_exists(
        &self,
        slug: &str,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepoError>;

    /// First free slug for `date`, starting from `base` and suffixing `-2`, `-3`...
    async fn unique_slug(
        &self,
        base: &str,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<String, RepoError> {
        let mut attempt = 1;
        loop {
            let candidate = slug::candidate(base, attempt);
            if !self.slug_exists(&candidate, date, exclude).await? {
                return Ok(candidate);
            }
            attempt += 1;
        }
    }

    /// Store a new post under the first slug still free on its publication day.
    ///
    /// Losing a race for the slug to a concurrent insert surfaces as a
    /// constraint violation; the slug is then derived again.
    async fn insert_with_unique_slug(&self, mut post: Post) -> Result<Post, RepoError> {
        let base = post.slug.clone();
        let date = post.published_date();
        let mut retries = 0;
        loop {
            post.slug = self.unique_slug(&base, date, None).await?;
            match self.save(post.clone()).await {
                Err(RepoError::Constraint(_)) if retries < SLUG_RETRIES => retries += 1,
                result => return result,
            }
        }
    }

    /// Date+slug lookup with a fallback to the slug alone.
    async fn find_published(
        &self,
        date: Option<NaiveDate>,
        slug: &str,
    ) -> Result<Option<Post>, RepoError> {
        if let Some(date) = date {
            if let Some(post) = self.find_published_by_date_slug(date, slug).await? {
                return Ok(Some(post));
            }
        }
        self.find_published_by_slug(slug).await
    }
}

/// Comment repository.
#[async_trait]
pub trait CommentRepository: BaseRepository<Comment, Uuid> {
    /// Active comments of a post, oldest first.
    async fn find_active_by_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError>;

    /// Set the moderation flag on several comments; returns how many matched.
    async fn set_active(&self, ids: &[Uuid], active: bool) -> Result<u64, RepoError>;
}
