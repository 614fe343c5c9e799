#![allow(dead_code)]

use async_trait::async_trait;
use campus_news::{
    AppState, MockClassifier,
    auth,
    classifier::ClassificationResult,
    config::AppConfig,
    models::{News, NewsPage, NewNews, NewUser, UpdateNewsRequest, User, UserRole},
    repository::{NewsQuery, Repository},
};
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// --- IN-MEMORY REPOSITORY ---

/// Behaves like the Postgres repository closely enough for handler tests:
/// same filters, ordering and counter semantics, no database.
#[derive(Default)]
pub struct InMemoryRepository {
    pub users: Mutex<Vec<User>>,
    pub news: Mutex<Vec<News>>,
}

impl InMemoryRepository {
    pub fn news_by_id(&self, id: Uuid) -> Option<News> {
        self.news.lock().unwrap().iter().find(|n| n.id == id).cloned()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    async fn get_user_by_email(&self, email: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    async fn create_user(&self, user: NewUser) -> Option<User> {
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            is_active: user.is_active,
            hashed_password: user.hashed_password,
            created_at: Some(now),
            last_login: Some(now),
            preferred_categories: vec![],
            matric_number: user.matric_number,
            department: user.department,
            level: None,
            staff_id: user.staff_id,
        };
        self.users.lock().unwrap().push(created.clone());
        Some(created)
    }

    async fn list_users(&self) -> Vec<User> {
        self.users.lock().unwrap().clone()
    }

    async fn record_login(&self, id: Uuid) -> bool {
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.last_login = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    async fn set_preferred_categories(&self, id: Uuid, categories: Vec<String>) -> bool {
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.preferred_categories = categories;
                true
            }
            None => false,
        }
    }

    async fn create_news(&self, news: NewNews) -> Option<News> {
        let created = News {
            id: Uuid::new_v4(),
            title: news.title,
            content: news.content,
            category: Some(news.category),
            source: news.source,
            tags: news.tags,
            image_url: news.image_url,
            created_at: Utc::now(),
            updated_at: None,
            created_by: Some(news.created_by),
            views_count: 0,
            likes_count: 0,
            is_featured: false,
            is_active: true,
            confidence_score: Some(news.confidence_score),
        };
        self.news.lock().unwrap().push(created.clone());
        Some(created)
    }

    async fn get_news(&self, id: Uuid) -> Option<News> {
        self.news_by_id(id)
    }

    async fn update_news(
        &self,
        id: Uuid,
        update: UpdateNewsRequest,
        classification: Option<ClassificationResult>,
    ) -> Option<News> {
        let mut all = self.news.lock().unwrap();
        let news = all.iter_mut().find(|n| n.id == id)?;

        if let Some(title) = update.title {
            news.title = title;
        }
        if let Some(content) = update.content {
            news.content = content;
        }
        if let Some(source) = update.source {
            news.source = Some(source);
        }
        if let Some(tags) = update.tags {
            news.tags = tags;
        }
        if let Some(image_url) = update.image_url {
            news.image_url = Some(image_url);
        }
        if let Some(is_featured) = update.is_featured {
            news.is_featured = is_featured;
        }
        if let Some(is_active) = update.is_active {
            news.is_active = is_active;
        }
        match classification {
            Some(result) => {
                news.category = Some(result.category);
                news.confidence_score = Some(result.confidence);
            }
            None => {
                if let Some(category) = update.category {
                    news.category = Some(category);
                }
            }
        }
        news.updated_at = Some(Utc::now());
        Some(news.clone())
    }

    async fn delete_news(&self, id: Uuid) -> bool {
        let mut all = self.news.lock().unwrap();
        let before = all.len();
        all.retain(|n| n.id != id);
        all.len() < before
    }

    async fn list_news(&self, query: NewsQuery) -> NewsPage {
        let mut matching: Vec<News> = self
            .news
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.is_active)
            .filter(|n| match &query.category {
                Some(c) => n.category.as_ref() == Some(c),
                None => true,
            })
            .filter(|n| match &query.search {
                Some(s) => {
                    let s = s.to_lowercase();
                    n.title.to_lowercase().contains(&s) || n.content.to_lowercase().contains(&s)
                }
                None => true,
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect();

        NewsPage { items, total }
    }

    async fn recommended_news(&self, categories: &[String], limit: i64) -> Vec<News> {
        let mut matching: Vec<News> = self
            .news
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.is_active)
            .filter(|n| {
                categories.is_empty()
                    || n.category.as_ref().is_some_and(|c| categories.contains(c))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit as usize);
        matching
    }

    async fn increment_views(&self, ids: &[Uuid]) {
        for news in self.news.lock().unwrap().iter_mut() {
            if ids.contains(&news.id) {
                news.views_count += 1;
            }
        }
    }

    async fn like_news(&self, id: Uuid) -> bool {
        let mut all = self.news.lock().unwrap();
        match all.iter_mut().find(|n| n.id == id) {
            Some(news) => {
                news.likes_count += 1;
                true
            }
            None => false,
        }
    }
}

// --- TEST UTILITIES ---

pub fn test_state(repo: Arc<InMemoryRepository>, classifier: MockClassifier) -> AppState {
    AppState {
        repo,
        classifier: Arc::new(classifier),
        config: AppConfig::default(),
    }
}

/// Inserts a user directly, bypassing password hashing.
pub fn seed_user(repo: &InMemoryRepository, role: UserRole) -> User {
    let user = User {
        id: Uuid::new_v4(),
        email: format!("{}-{}@cu.edu.ng", role, Uuid::new_v4().simple()),
        full_name: format!("Test {}", role),
        role,
        is_active: true,
        hashed_password: "not-a-real-hash".to_string(),
        created_at: Some(Utc::now()),
        ..User::default()
    };
    repo.users.lock().unwrap().push(user.clone());
    user
}

/// Inserts an article `age_minutes` old.
pub fn seed_news(
    repo: &InMemoryRepository,
    title: &str,
    category: &str,
    age_minutes: i64,
) -> News {
    let news = News {
        id: Uuid::new_v4(),
        title: title.to_string(),
        content: format!("{} content", title),
        category: Some(category.to_string()),
        created_at: Utc::now() - Duration::minutes(age_minutes),
        is_active: true,
        confidence_score: Some(0.8),
        ..News::default()
    };
    repo.news.lock().unwrap().push(news.clone());
    news
}

pub fn bearer_for(user: &User) -> String {
    let token = auth::create_access_token(user.id, &AppConfig::default()).unwrap();
    format!("Bearer {}", token)
}
