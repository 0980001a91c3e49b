//! Domain entities - the core business objects.

mod comment;
mod page;
mod post;
mod profile;
mod user;

pub mod slug;

pub use comment::Comment;
pub use page::{Page, PageRequest};
pub use post::{Post, PostStatus};
pub use profile::Profile;
pub use user::{ROLE_MODERATOR, ROLE_USER, User};
