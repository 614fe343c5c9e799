use crate::classifier::ClassificationResult;
use crate::models::{News, NewsPage, NewNews, NewUser, UpdateNewsRequest, User};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// NewsQuery
///
/// Already-validated listing parameters for `Repository::list_news`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: i64,
    pub limit: i64,
}

impl NewsQuery {
    /// Rows to skip, or `None` when the page is out of range.
    pub fn checked_offset(&self) -> Option<i64> {
        self.page.checked_sub(1)?.checked_mul(self.limit)
    }

    /// Saturates instead of overflowing; callers validate with `checked_offset`.
    pub fn offset(&self) -> i64 {
        self.checked_offset().unwrap_or(i64::MAX).max(0)
    }
}

/// Turns free text into an `ILIKE` substring pattern, escaping `\`, `%` and `_`
/// so they match literally.
pub fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers only ever see
/// `Arc<dyn Repository>`, so tests swap in an in-memory implementation.
///
/// Database errors are logged by the implementation and surface as `None`,
/// `false` or an empty collection.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Option<User>;
    async fn get_user_by_email(&self, email: &str) -> Option<User>;
    async fn create_user(&self, user: NewUser) -> Option<User>;
    async fn list_users(&self) -> Vec<User>;
    async fn record_login(&self, id: Uuid) -> bool;
    async fn set_preferred_categories(&self, id: Uuid, categories: Vec<String>) -> bool;

    // --- News ---
    async fn create_news(&self, news: NewNews) -> Option<News>;
    async fn get_news(&self, id: Uuid) -> Option<News>;
    /// Applies the `Some` fields of `update`. A classification, when given,
    /// overrides both `category` and `confidence_score`.
    async fn update_news(
        &self,
        id: Uuid,
        update: UpdateNewsRequest,
        classification: Option<ClassificationResult>,
    ) -> Option<News>;
    async fn delete_news(&self, id: Uuid) -> bool;
    // Active articles only, newest first.
    async fn list_news(&self, query: NewsQuery) -> NewsPage;
    async fn recommended_news(&self, categories: &[String], limit: i64) -> Vec<News>;
    async fn increment_views(&self, ids: &[Uuid]);
    // Returns false when the article does not exist.
    async fn like_news(&self, id: Uuid) -> bool;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, email, full_name, role, is_active, hashed_password, created_at, \
     last_login, preferred_categories, matric_number, department, level, staff_id";

const NEWS_COLUMNS: &str = "id, title, content, category, source, tags, image_url, created_at, \
     updated_at, created_by, views_count, likes_count, is_featured, is_active, confidence_score";

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the shared `WHERE` clause of the public listing.
fn push_listing_filters(builder: &mut QueryBuilder<'_, sqlx::Postgres>, query: &NewsQuery) {
    builder.push(" WHERE is_active = true");

    if let Some(category) = &query.category {
        builder.push(" AND category = ");
        builder.push_bind(category.clone());
    }

    if let Some(search) = &query.search {
        let pattern = contains_pattern(search);
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR content ILIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn get_user_by_email(&self, email: &str) -> Option<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user_by_email error: {:?}", e);
                None
            })
    }

    /// create_user
    ///
    /// New users start with an empty preference list and `created_at = last_login = NOW()`.
    async fn create_user(&self, user: NewUser) -> Option<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (id, email, full_name, role, is_active, hashed_password,
                                  matric_number, department, staff_id, created_at, last_login)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(user.email)
        .bind(user.full_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.hashed_password)
        .bind(user.matric_number)
        .bind(user.department)
        .bind(user.staff_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| tracing::error!("create_user error: {:?}", e))
        .ok()
    }

    async fn list_users(&self) -> Vec<User> {
        match sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        {
            Ok(users) => users,
            Err(e) => {
                tracing::error!("list_users error: {:?}", e);
                vec![]
            }
        }
    }

    async fn record_login(&self, id: Uuid) -> bool {
        match sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("record_login error: {:?}", e);
                false
            }
        }
    }

    async fn set_preferred_categories(&self, id: Uuid, categories: Vec<String>) -> bool {
        match sqlx::query("UPDATE users SET preferred_categories = $1 WHERE id = $2")
            .bind(categories)
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("set_preferred_categories error: {:?}", e);
                false
            }
        }
    }

    /// create_news
    ///
    /// New articles are active, not featured, with zeroed counters.
    async fn create_news(&self, news: NewNews) -> Option<News> {
        sqlx::query_as::<_, News>(&format!(
            r#"INSERT INTO news (id, title, content, category, source, tags, image_url,
                                 created_by, confidence_score, created_at,
                                 views_count, likes_count, is_featured, is_active)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), 0, 0, false, true)
               RETURNING {NEWS_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(news.title)
        .bind(news.content)
        .bind(news.category)
        .bind(news.source)
        .bind(news.tags)
        .bind(news.image_url)
        .bind(news.created_by)
        .bind(news.confidence_score)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| tracing::error!("create_news error: {:?}", e))
        .ok()
    }

    async fn get_news(&self, id: Uuid) -> Option<News> {
        sqlx::query_as::<_, News>(&format!("SELECT {NEWS_COLUMNS} FROM news WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_news error: {:?}", e);
                None
            })
    }

    /// update_news
    ///
    /// Uses `COALESCE` so that only provided fields change.
    async fn update_news(
        &self,
        id: Uuid,
        update: UpdateNewsRequest,
        classification: Option<ClassificationResult>,
    ) -> Option<News> {
        let (category, confidence) = match classification {
            Some(result) => (Some(result.category), Some(result.confidence)),
            None => (update.category, None),
        };

        sqlx::query_as::<_, News>(&format!(
            r#"UPDATE news
               SET title = COALESCE($2, title),
                   content = COALESCE($3, content),
                   category = COALESCE($4, category),
                   source = COALESCE($5, source),
                   tags = COALESCE($6, tags),
                   image_url = COALESCE($7, image_url),
                   is_featured = COALESCE($8, is_featured),
                   is_active = COALESCE($9, is_active),
                   confidence_score = COALESCE($10, confidence_score),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {NEWS_COLUMNS}"#
        ))
        .bind(id)
        .bind(update.title)
        .bind(update.content)
        .bind(category)
        .bind(update.source)
        .bind(update.tags)
        .bind(update.image_url)
        .bind(update.is_featured)
        .bind(update.is_active)
        .bind(confidence)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("update_news error: {:?}", e);
            None
        })
    }

    async fn delete_news(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM news WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_news error: {:?}", e);
                false
            }
        }
    }

    /// list_news
    ///
    /// Runs the count and the page query with the same filters, built with
    /// `QueryBuilder` so every user value is bound, never interpolated.
    async fn list_news(&self, query: NewsQuery) -> NewsPage {
        let mut count_builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM news");
        push_listing_filters(&mut count_builder, &query);

        let total = match count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
        {
            Ok(total) => total,
            Err(e) => {
                tracing::error!("list_news count error: {:?}", e);
                return NewsPage::default();
            }
        };

        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {NEWS_COLUMNS} FROM news"));
        push_listing_filters(&mut builder, &query);
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(query.limit);
        builder.push(" OFFSET ");
        builder.push_bind(query.offset());

        match builder.build_query_as::<News>().fetch_all(&self.pool).await {
            Ok(items) => NewsPage { items, total },
            Err(e) => {
                tracing::error!("list_news error: {:?}", e);
                NewsPage::default()
            }
        }
    }

    async fn recommended_news(&self, categories: &[String], limit: i64) -> Vec<News> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {NEWS_COLUMNS} FROM news WHERE is_active = true"
        ));
        if !categories.is_empty() {
            builder.push(" AND category = ANY(");
            builder.push_bind(categories.to_vec());
            builder.push(")");
        }
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(limit);

        match builder.build_query_as::<News>().fetch_all(&self.pool).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!("recommended_news error: {:?}", e);
                vec![]
            }
        }
    }

    async fn increment_views(&self, ids: &[Uuid]) {
        if ids.is_empty() {
            return;
        }
        if let Err(e) = sqlx::query("UPDATE news SET views_count = views_count + 1 WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await
        {
            tracing::error!("increment_views error: {:?}", e);
        }
    }

    async fn like_news(&self, id: Uuid) -> bool {
        match sqlx::query("UPDATE news SET likes_count = likes_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("like_news error: {:?}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: i64, limit: i64) -> NewsQuery {
        NewsQuery {
            page,
            limit,
            ..NewsQuery::default()
        }
    }

    #[test]
    fn test_offset_for_valid_pages() {
        assert_eq!(query(1, 10).offset(), 0);
        assert_eq!(query(3, 25).offset(), 50);
        assert_eq!(query(3, 25).checked_offset(), Some(50));
    }

    #[test]
    fn test_offset_overflow_is_detected_not_wrapped() {
        let huge = query(i64::MAX, 100);

        assert_eq!(huge.checked_offset(), None);
        assert_eq!(huge.offset(), i64::MAX);
        assert_eq!(query(i64::MIN, 10).checked_offset(), None);
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("exams"), "%exams%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("snake_case"), "%snake\\_case%");
        assert_eq!(contains_pattern("C:\\dir"), "%C:\\\\dir%");
    }
}
