//! In-memory repositories - used when no database is configured, and in tests.
//!
//! All four repositories share one set of tables so cascades and
//! cross-entity transactions behave like the PostgreSQL schema.
//! Data is lost on process restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use quill_core::domain::{Comment, Page, PageRequest, Post, Profile, User};
use quill_core::error::RepoError;
use quill_core::ports::{
    BaseRepository, CommentRepository, PostRepository, ProfileRepository, UserRepository,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, Profile>,
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Comment>,
}

impl Tables {
    fn check_user_unique(&self, user: &User) -> Result<(), RepoError> {
        let clash = self.users.values().any(|u| {
            u.id != user.id && (u.username == user.username || u.email == user.email)
        });
        if clash {
            return Err(RepoError::Constraint("username or email already taken".into()));
        }
        Ok(())
    }

    fn check_post_unique(&self, post: &Post) -> Result<(), RepoError> {
        let date = post.published_date();
        let clash = self
            .posts
            .values()
            .any(|p| p.id != post.id && p.slug == post.slug && p.published_date() == date);
        if clash {
            return Err(RepoError::Constraint(format!(
                "slug '{}' already used on {date}",
                post.slug
            )));
        }
        Ok(())
    }

    fn delete_post(&mut self, id: Uuid) -> bool {
        self.comments.retain(|_, c| c.post_id != id);
        self.posts.remove(&id).is_some()
    }
}

/// Handle to the shared in-memory tables; hands out per-entity repositories.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> InMemoryUserRepository {
        InMemoryUserRepository {
            tables: self.tables.clone(),
        }
    }

    pub fn profiles(&self) -> InMemoryProfileRepository {
        InMemoryProfileRepository {
            tables: self.tables.clone(),
        }
    }

    pub fn posts(&self) -> InMemoryPostRepository {
        InMemoryPostRepository {
            tables: self.tables.clone(),
        }
    }

    pub fn comments(&self) -> InMemoryCommentRepository {
        InMemoryCommentRepository {
            tables: self.tables.clone(),
        }
    }
}

pub struct InMemoryUserRepository {
    tables: Arc<RwLock<Tables>>,
}

pub struct InMemoryProfileRepository {
    tables: Arc<RwLock<Tables>>,
}

pub struct InMemoryPostRepository {
    tables: Arc<RwLock<Tables>>,
}

pub struct InMemoryCommentRepository {
    tables: Arc<RwLock<Tables>>,
}

#[async_trait]
impl BaseRepository<User, Uuid> for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn save(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        tables.check_user_unique(&user)?;
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }

        let authored: Vec<Uuid> = tables
            .posts
            .values()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in authored {
            tables.delete_post(post_id);
        }
        tables.comments.retain(|_, c| c.author_id != Some(id));
        tables.profiles.retain(|_, p| p.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn save_with_profile(
        &self,
        user: User,
        mut profile: Profile,
    ) -> Result<(User, Profile), RepoError> {
        // Single write lock: both rows change together or not at all.
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Err(RepoError::NotFound);
        }
        tables.check_user_unique(&user)?;

        if let Some(existing) = tables.profiles.values().find(|p| p.user_id == user.id) {
            profile.id = existing.id;
            profile.created_at = existing.created_at;
        }
        profile.user_id = user.id;

        tables.users.insert(user.id, user.clone());
        tables.profiles.insert(profile.id, profile.clone());
        Ok((user, profile))
    }
}

#[async_trait]
impl BaseRepository<Profile, Uuid> for InMemoryProfileRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, RepoError> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn save(&self, profile: Profile) -> Result<Profile, RepoError> {
        let mut tables = self.tables.write().await;
        let clash = tables
            .profiles
            .values()
            .any(|p| p.user_id == profile.user_id && p.id != profile.id);
        if clash {
            return Err(RepoError::Constraint("user already has a profile".into()));
        }
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        match self.tables.write().await.profiles.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RepoError::NotFound),
        }
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Profile>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .values()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn get_or_create(&self, user_id: Uuid) -> Result<Profile, RepoError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.profiles.values().find(|p| p.user_id == user_id) {
            return Ok(existing.clone());
        }
        if !tables.users.contains_key(&user_id) {
            return Err(RepoError::Constraint("profile owner does not exist".into()));
        }

        let profile = Profile::new(user_id);
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for InMemoryPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn save(&self, post: Post) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&post.author_id) {
            return Err(RepoError::Constraint("post author does not exist".into()));
        }
        tables.check_post_unique(&post)?;
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        if self.tables.write().await.delete_post(id) {
            Ok(())
        } else {
            Err(RepoError::NotFound)
        }
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn list_published(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let search = search.map(str::trim).filter(|q| !q.is_empty());
        let tables = self.tables.read().await;

        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| p.is_published())
            .filter(|p| search.is_none_or(|q| p.matches(q)))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        Ok(Page::from_vec(posts, page))
    }

    async fn find_published_by_date_slug(
        &self,
        date: NaiveDate,
        slug: &str,
    ) -> Result<Option<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .values()
            .filter(|p| p.is_published() && p.slug == slug && p.published_date() == date)
            .max_by_key(|p| p.published_at)
            .cloned())
    }

    async fn find_published_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .values()
            .filter(|p| p.is_published() && p.slug == slug)
            .max_by_key(|p| p.published_at)
            .cloned())
    }

    async fn find_by_author(
        &self,
        author_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let tables = self.tables.read().await;
        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| p.author_id == author_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(Page::from_vec(posts, page))
    }

    async fn slug_exists(
        &self,
        slug: &str,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.values().any(|p| {
            Some(p.id) != exclude && p.slug == slug && p.published_date() == date
        }))
    }
}

#[async_trait]
impl BaseRepository<Comment, Uuid> for InMemoryCommentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn save(&self, comment: Comment) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(RepoError::Constraint("comment post does not exist".into()));
        }
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        match self.tables.write().await.comments.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RepoError::NotFound),
        }
    }
}

#[async_trait]
impl CommentRepository for InMemoryCommentRepository {
    async fn find_active_by_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id && c.active)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    async fn set_active(&self, ids: &[Uuid], active: bool) -> Result<u64, RepoError> {
        let mut tables = self.tables.write().await;
        let mut matched = 0;
        for id in ids {
            if let Some(comment) = tables.comments.get_mut(id) {
                comment.active = active;
                matched += 1;
            }
        }
        Ok(matched)
    }
}
