//! Data models
//!
//! Documents of the `users`, `posts`, and `comments` collections, the
//! insert/patch bodies written for them, and the small value types around
//! them (roles, sessions, votes, categories).

mod category;
mod comment;
mod post;
mod session;
mod user;
mod vote;

pub use category::{Category, CATEGORIES};
pub use comment::{Comment, CommentPatch, NewComment};
pub use post::{NewPost, Post, PostPatch};
pub use session::Session;
pub use user::{NewUser, User, UserPatch, UserProfile, UserRole};
pub use vote::Vote;
