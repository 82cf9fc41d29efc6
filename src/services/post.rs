//! Post service
//!
//! Posts and their comments, category listing, and vote counters. Votes go
//! through the store's atomic increment so concurrent votes are never lost.

use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use crate::db::{to_fields, Collection, Document, DocumentStore, Filter, Snapshot};
use crate::models::{Comment, CommentPatch, NewComment, NewPost, Post, PostPatch, Vote};

const VOTE_FIELD: &str = "voteCount";

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found")]
    PostNotFound,

    #[error("Comment not found")]
    CommentNotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for creating a post
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
}

impl CreatePostInput {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        categories: Vec<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            categories,
        }
    }
}

/// Post and comment service
pub struct PostService {
    store: Arc<dyn DocumentStore>,
}

impl PostService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Posts
    // ========================================================================

    /// Create a post owned by `created_by`. Returns the new post id.
    pub async fn create_post(
        &self,
        input: CreatePostInput,
        created_by: &str,
    ) -> Result<String, PostServiceError> {
        let post = NewPost::new(
            input.title,
            input.description,
            input.categories,
            created_by.to_string(),
        );
        let id = self
            .store
            .insert(Collection::Posts, to_fields(&post)?)
            .await
            .context("Failed to create post")?;

        tracing::info!(post_id = %id, user_id = %created_by, "Post created");
        Ok(id)
    }

    /// All posts, or those tagged with `category`
    pub async fn get_posts(&self, category: Option<&str>) -> Result<Vec<Post>, PostServiceError> {
        let filter = category.map(|c| Filter::array_contains("categories", c));
        self.list_posts(filter.as_ref()).await
    }

    pub async fn get_posts_by_user(&self, user_id: &str) -> Result<Vec<Post>, PostServiceError> {
        self.list_posts(Some(&Filter::eq("createdBy", user_id))).await
    }

    pub async fn get_post(&self, id: &str) -> Result<Snapshot<Post>, PostServiceError> {
        let snapshot = self
            .store
            .get(Collection::Posts, id)
            .await
            .context("Failed to fetch post")?
            .decode()?;
        Ok(snapshot)
    }

    pub async fn get_post_by_id(&self, id: &str) -> Result<Post, PostServiceError> {
        self.get_post(id)
            .await?
            .into_option()
            .ok_or(PostServiceError::PostNotFound)
    }

    /// Merge `patch` into a post.
    ///
    /// Returns the post as read before the write with the patch overlaid,
    /// which can differ from the stored state if another writer got in
    /// between.
    pub async fn update_post(&self, id: &str, mut patch: PostPatch) -> Result<Post, PostServiceError> {
        let mut post = self.get_post_by_id(id).await?;

        patch.updated_at = Some(Utc::now());
        let updated = self
            .store
            .update(Collection::Posts, id, to_fields(&patch)?)
            .await
            .context("Failed to update post")?;
        if !updated {
            return Err(PostServiceError::PostNotFound);
        }

        post.apply(&patch);
        Ok(post)
    }

    /// Delete a post. Its comments stay behind.
    pub async fn delete_post(&self, id: &str) -> Result<(), PostServiceError> {
        let deleted = self
            .store
            .delete(Collection::Posts, id)
            .await
            .context("Failed to delete post")?;
        if !deleted {
            return Err(PostServiceError::PostNotFound);
        }
        tracing::info!(post_id = %id, "Post deleted");
        Ok(())
    }

    /// Apply a vote payload to a post and return the post afterwards.
    ///
    /// A payload other than exactly `1` or `-1` changes nothing.
    pub async fn vote_post(&self, id: &str, vote_count: Option<&Value>) -> Result<Post, PostServiceError> {
        let snapshot = match Vote::from_vote_count(vote_count) {
            Some(vote) => self.apply_vote(Collection::Posts, id, vote).await?.decode()?,
            None => self.get_post(id).await?,
        };
        snapshot.into_option().ok_or(PostServiceError::PostNotFound)
    }

    // ========================================================================
    // Comments
    // ========================================================================

    /// Add a comment to an existing post. Returns the new comment id.
    pub async fn add_comment(
        &self,
        post_id: &str,
        description: String,
        created_by: &str,
    ) -> Result<String, PostServiceError> {
        if !self.get_post(post_id).await?.is_found() {
            return Err(PostServiceError::PostNotFound);
        }

        let comment = NewComment::new(description, post_id.to_string(), created_by.to_string());
        let id = self
            .store
            .insert(Collection::Comments, to_fields(&comment)?)
            .await
            .context("Failed to add comment")?;

        tracing::info!(comment_id = %id, post_id = %post_id, "Comment added");
        Ok(id)
    }

    pub async fn get_comment(&self, id: &str) -> Result<Snapshot<Comment>, PostServiceError> {
        let snapshot = self
            .store
            .get(Collection::Comments, id)
            .await
            .context("Failed to fetch comment")?
            .decode()?;
        Ok(snapshot)
    }

    pub async fn get_comment_by_id(&self, id: &str) -> Result<Comment, PostServiceError> {
        self.get_comment(id)
            .await?
            .into_option()
            .ok_or(PostServiceError::CommentNotFound)
    }

    /// Comments referencing `post_id`, oldest first. The post itself need not
    /// exist.
    pub async fn get_comments_of_post(&self, post_id: &str) -> Result<Vec<Comment>, PostServiceError> {
        let comments = self
            .store
            .list(Collection::Comments, Some(&Filter::eq("postId", post_id)))
            .await
            .context("Failed to list comments")?
            .into_iter()
            .map(|doc| doc.decode())
            .collect::<anyhow::Result<Vec<Comment>>>()?;
        Ok(comments)
    }

    /// Replace a comment's text and return the stored comment
    pub async fn update_comment(
        &self,
        id: &str,
        description: Option<String>,
    ) -> Result<Comment, PostServiceError> {
        let patch = CommentPatch {
            description,
            updated_at: Some(Utc::now()),
        };
        let updated = self
            .store
            .update(Collection::Comments, id, to_fields(&patch)?)
            .await
            .context("Failed to update comment")?;
        if !updated {
            return Err(PostServiceError::CommentNotFound);
        }
        self.get_comment_by_id(id).await
    }

    pub async fn vote_comment(
        &self,
        id: &str,
        vote_count: Option<&Value>,
    ) -> Result<Comment, PostServiceError> {
        let snapshot = match Vote::from_vote_count(vote_count) {
            Some(vote) => self.apply_vote(Collection::Comments, id, vote).await?.decode()?,
            None => self.get_comment(id).await?,
        };
        snapshot.into_option().ok_or(PostServiceError::CommentNotFound)
    }

    pub async fn delete_comment(&self, id: &str) -> Result<(), PostServiceError> {
        let deleted = self
            .store
            .delete(Collection::Comments, id)
            .await
            .context("Failed to delete comment")?;
        if !deleted {
            return Err(PostServiceError::CommentNotFound);
        }
        tracing::info!(comment_id = %id, "Comment deleted");
        Ok(())
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn list_posts(&self, filter: Option<&Filter>) -> Result<Vec<Post>, PostServiceError> {
        let posts = self
            .store
            .list(Collection::Posts, filter)
            .await
            .context("Failed to list posts")?
            .into_iter()
            .map(|doc| doc.decode())
            .collect::<anyhow::Result<Vec<Post>>>()?;
        Ok(posts)
    }

    async fn apply_vote(
        &self,
        collection: Collection,
        id: &str,
        vote: Vote,
    ) -> Result<Snapshot<Document>, PostServiceError> {
        let snapshot = self
            .store
            .increment(collection, id, VOTE_FIELD, vote.delta(), Utc::now())
            .await
            .with_context(|| format!("Failed to record vote on {}/{}", collection, id))?;
        tracing::debug!(%collection, id = %id, delta = vote.delta(), "Vote recorded");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations, SqlxDocumentStore};
    use proptest::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    async fn setup_test_service() -> PostService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        PostService::new(SqlxDocumentStore::boxed(pool))
    }

    async fn create_sample_post(service: &PostService, categories: &[&str]) -> String {
        let input = CreatePostInput::new(
            "T",
            "D",
            categories.iter().map(|c| c.to_string()).collect(),
        );
        service.create_post(input, "u1").await.expect("Failed to create post")
    }

    // ========================================================================
    // Post tests
    // ========================================================================

    #[tokio::test]
    async fn test_create_then_fetch_post() {
        let service = setup_test_service().await;
        let id = create_sample_post(&service, &["sports"]).await;

        let post = service.get_post_by_id(&id).await.unwrap();
        assert_eq!(post.id, id);
        assert_eq!(post.title, "T");
        assert_eq!(post.description, "D");
        assert_eq!(post.categories, vec!["sports".to_string()]);
        assert_eq!(post.created_by, "u1");
        assert_eq!(post.vote_count, 0);
        assert_eq!(post.created_at, post.updated_at);
    }

    #[tokio::test]
    async fn test_missing_post() {
        let service = setup_test_service().await;

        assert!(!service.get_post("nope").await.unwrap().is_found());
        assert!(matches!(
            service.get_post_by_id("nope").await,
            Err(PostServiceError::PostNotFound)
        ));
    }

    #[tokio::test]
    async fn test_get_posts_by_category_and_user() {
        let service = setup_test_service().await;
        let sports = create_sample_post(&service, &["sports"]).await;
        let both = create_sample_post(&service, &["sports", "video-games"]).await;
        let games = service
            .create_post(CreatePostInput::new("G", "D", vec!["video-games".into()]), "u2")
            .await
            .unwrap();

        let all = service.get_posts(None).await.unwrap();
        assert_eq!(all.len(), 3);

        let ids: Vec<String> = service
            .get_posts(Some("sports"))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![sports, both]);

        let by_u2 = service.get_posts_by_user("u2").await.unwrap();
        assert_eq!(by_u2.len(), 1);
        assert_eq!(by_u2[0].id, games);

        assert!(service.get_posts(Some("cooking")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_post_changes_only_supplied_fields() {
        let service = setup_test_service().await;
        let id = create_sample_post(&service, &["sports"]).await;
        let before = service.get_post_by_id(&id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let returned = service
            .update_post(
                &id,
                PostPatch {
                    title: Some("T2".into()),
                    ..PostPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(returned.title, "T2");

        let stored = service.get_post_by_id(&id).await.unwrap();
        assert_eq!(stored.title, "T2");
        assert_eq!(stored.description, before.description);
        assert_eq!(stored.categories, before.categories);
        assert_eq!(stored.created_by, before.created_by);
        assert_eq!(stored.created_at, before.created_at);
        assert!(stored.updated_at > before.updated_at);
        assert_eq!(returned, stored);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_post() {
        let service = setup_test_service().await;

        assert!(matches!(
            service.update_post("nope", PostPatch::default()).await,
            Err(PostServiceError::PostNotFound)
        ));
        assert!(matches!(
            service.delete_post("nope").await,
            Err(PostServiceError::PostNotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_post_leaves_comments() {
        let service = setup_test_service().await;
        let post_id = create_sample_post(&service, &["sports"]).await;
        let comment_id = service.add_comment(&post_id, "hi".into(), "u2").await.unwrap();

        service.delete_post(&post_id).await.unwrap();

        assert!(!service.get_post(&post_id).await.unwrap().is_found());
        assert!(service.get_comment_by_id(&comment_id).await.is_ok());
        assert_eq!(service.get_comments_of_post(&post_id).await.unwrap().len(), 1);
    }

    // ========================================================================
    // Vote tests
    // ========================================================================

    #[tokio::test]
    async fn test_vote_post_repeats_accumulate() {
        let service = setup_test_service().await;
        let id = create_sample_post(&service, &["sports"]).await;

        let post = service.vote_post(&id, Some(&json!(1))).await.unwrap();
        assert_eq!(post.vote_count, 1);
        let post = service.vote_post(&id, Some(&json!(1))).await.unwrap();
        assert_eq!(post.vote_count, 2);
        let post = service.vote_post(&id, Some(&json!(-1))).await.unwrap();
        assert_eq!(post.vote_count, 1);
    }

    #[tokio::test]
    async fn test_down_votes_can_go_negative() {
        let service = setup_test_service().await;
        let id = create_sample_post(&service, &["sports"]).await;

        service.vote_post(&id, Some(&json!(-1))).await.unwrap();
        let post = service.vote_post(&id, Some(&json!(-1))).await.unwrap();
        assert_eq!(post.vote_count, -2);
    }

    #[tokio::test]
    async fn test_invalid_vote_is_a_no_op() {
        let service = setup_test_service().await;
        let id = create_sample_post(&service, &["sports"]).await;
        service.vote_post(&id, Some(&json!(1))).await.unwrap();

        for payload in [json!(0), json!(2), json!("1"), json!(null)] {
            let post = service.vote_post(&id, Some(&payload)).await.unwrap();
            assert_eq!(post.vote_count, 1, "{}", payload);
        }
        let post = service.vote_post(&id, None).await.unwrap();
        assert_eq!(post.vote_count, 1);
    }

    #[tokio::test]
    async fn test_vote_missing_targets() {
        let service = setup_test_service().await;

        assert!(matches!(
            service.vote_post("nope", Some(&json!(1))).await,
            Err(PostServiceError::PostNotFound)
        ));
        assert!(matches!(
            service.vote_post("nope", Some(&json!(5))).await,
            Err(PostServiceError::PostNotFound)
        ));
        assert!(matches!(
            service.vote_comment("nope", Some(&json!(-1))).await,
            Err(PostServiceError::CommentNotFound)
        ));
    }

    // ========================================================================
    // Comment tests
    // ========================================================================

    #[tokio::test]
    async fn test_comment_lifecycle() {
        let service = setup_test_service().await;
        let post_id = create_sample_post(&service, &["sports"]).await;

        let id = service.add_comment(&post_id, "first".into(), "u2").await.unwrap();
        let comment = service.get_comment_by_id(&id).await.unwrap();
        assert_eq!(comment.description, "first");
        assert_eq!(comment.post_id, post_id);
        assert_eq!(comment.created_by, "u2");
        assert_eq!(comment.vote_count, 0);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let updated = service.update_comment(&id, Some("edited".into())).await.unwrap();
        assert_eq!(updated.description, "edited");
        assert!(updated.updated_at > comment.updated_at);

        let voted = service.vote_comment(&id, Some(&json!(1))).await.unwrap();
        assert_eq!(voted.vote_count, 1);
        let ignored = service.vote_comment(&id, Some(&json!(3))).await.unwrap();
        assert_eq!(ignored.vote_count, 1);

        service.delete_comment(&id).await.unwrap();
        assert!(!service.get_comment(&id).await.unwrap().is_found());
        assert!(matches!(
            service.delete_comment(&id).await,
            Err(PostServiceError::CommentNotFound)
        ));
    }

    #[tokio::test]
    async fn test_add_comment_to_missing_post() {
        let service = setup_test_service().await;

        let result = service.add_comment("nope", "hi".into(), "u1").await;
        assert!(matches!(result, Err(PostServiceError::PostNotFound)));
    }

    #[tokio::test]
    async fn test_comments_of_post_are_scoped() {
        let service = setup_test_service().await;
        let first = create_sample_post(&service, &["sports"]).await;
        let second = create_sample_post(&service, &["sports"]).await;

        service.add_comment(&first, "a".into(), "u1").await.unwrap();
        service.add_comment(&first, "b".into(), "u1").await.unwrap();
        service.add_comment(&second, "c".into(), "u1").await.unwrap();

        let comments = service.get_comments_of_post(&first).await.unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.description.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert!(service.get_comments_of_post("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_comment() {
        let service = setup_test_service().await;
        assert!(matches!(
            service.update_comment("nope", Some("x".into())).await,
            Err(PostServiceError::CommentNotFound)
        ));
    }

    // ========================================================================
    // Property tests
    // ========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// The stored counter moves by exactly the sum of the recognised
        /// votes; everything else leaves it alone.
        #[test]
        fn property_vote_counter_tracks_valid_votes(
            payloads in proptest::collection::vec(-3i64..=3, 0..12),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let final_count = runtime.block_on(async {
                let service = setup_test_service().await;
                let id = create_sample_post(&service, &["sports"]).await;
                for n in &payloads {
                    service.vote_post(&id, Some(&json!(n))).await.unwrap();
                }
                service.get_post_by_id(&id).await.unwrap().vote_count
            });

            let expected: i64 = payloads.iter().filter(|n| n.abs() == 1).sum();
            prop_assert_eq!(final_count, expected);
        }

        /// Filtering by category returns exactly the tagged posts, in
        /// insertion order.
        #[test]
        fn property_category_filter_selects_tagged_posts(
            tags in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..8),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let (expected, sports) = runtime.block_on(async {
                let service = setup_test_service().await;
                let mut expected = Vec::new();
                for (sports, games) in &tags {
                    let mut categories = Vec::new();
                    if *sports {
                        categories.push("sports");
                    }
                    if *games {
                        categories.push("video-games");
                    }
                    let id = create_sample_post(&service, &categories).await;
                    if *sports {
                        expected.push(id);
                    }
                }
                let sports = service.get_posts(Some("sports")).await.unwrap();
                (expected, sports)
            });

            let ids: Vec<String> = sports.iter().map(|p| p.id.clone()).collect();
            prop_assert_eq!(ids, expected);
            prop_assert!(sports.iter().all(|p| p.categories.iter().any(|c| c == "sports")));
        }
    }
}
