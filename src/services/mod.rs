//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the document store/cache:
//! - `user`: accounts, logins, sessions, the cached user list
//! - `post`: posts, comments, votes
//! - `access`: role and ownership decisions
//! - `password`, `token`: credential utilities

pub mod access;
pub mod password;
pub mod post;
pub mod token;
pub mod user;

pub use access::{authorize, AccessDenied, Permission, Principal};
pub use password::{hash_password, verify_password};
pub use post::{CreatePostInput, PostService, PostServiceError};
pub use token::{Claims, TokenError, TokenService};
pub use user::{
    LoginInput, LoginOutcome, ProfileUpdate, RegisterInput, UserService, UserServiceError,
};
