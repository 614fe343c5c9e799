use crate::{
    AppState,
    auth::{self, AuthUser},
    classifier::{ClassificationRequest, ClassificationResult, ClassifierError},
    models::{
        CreateNewsRequest, CreateUserRequest, DepartmentResponse, LoginRequest, MessageResponse,
        News, NewsFilter, NewsPage, NewNews, NewUser, PreferencesResponse, RecommendedFilter,
        RegisterRequest, TokenResponse, UpdateNewsRequest, User, UserRole, UserSummary,
    },
    repository::NewsQuery,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_RECOMMENDED: i64 = 5;
const MAX_RECOMMENDED: i64 = 20;

/// HTTP status for a classifier failure that reaches the client.
fn classifier_status(error: &ClassifierError) -> StatusCode {
    match error {
        ClassifierError::InvalidInput => StatusCode::BAD_REQUEST,
        ClassifierError::ServiceUnavailable(_) | ClassifierError::UnexpectedResponseShape(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ClassifierError::InitializationFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn token_response(user: &User, state: &AppState) -> Result<Json<TokenResponse>, StatusCode> {
    let access_token = auth::create_access_token(user.id, &state.config).map_err(|e| {
        tracing::error!("failed to sign access token: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: UserSummary::from(user),
    }))
}

fn hash_or_500(password: &str) -> Result<String, StatusCode> {
    auth::hash_password(password).map_err(|e| {
        tracing::error!("failed to hash password: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// --- Authentication ---

/// login
///
/// [Public Route] Exchanges email and password for an access token and
/// records the login time.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Incorrect email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, StatusCode> {
    let user = state
        .repo
        .get_user_by_email(&payload.username)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !auth::verify_password(&payload.password, &user.hashed_password) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    state.repo.record_login(user.id).await;
    token_response(&user, &state)
}

/// register
///
/// [Public Route] Creates an account and logs it in immediately.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = TokenResponse),
        (status = 400, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, StatusCode> {
    if state.repo.get_user_by_email(&payload.email).await.is_some() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let new_user = NewUser {
        email: payload.email,
        full_name: payload.full_name,
        role: payload.role,
        is_active: true,
        hashed_password: hash_or_500(&payload.password)?,
        ..NewUser::default()
    };

    let user = state
        .repo
        .create_user(new_user)
        .await
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    token_response(&user, &state)
}

/// get_me
///
/// [Authenticated Route] The caller's full profile.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, StatusCode> {
    state
        .repo
        .get_user(id)
        .await
        .map(Json)
        .ok_or(StatusCode::UNAUTHORIZED)
}

// --- Users ---

/// create_user
///
/// [Public Route] Creates a full user profile. Students need a matric number
/// and admins a staff id.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Created", body = User),
        (status = 400, description = "Duplicate email or missing role-specific field")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<User>, StatusCode> {
    if state.repo.get_user_by_email(&payload.email).await.is_some() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let matric_number = non_blank(payload.matric_number);
    let staff_id = non_blank(payload.staff_id);
    match payload.role {
        UserRole::Student if matric_number.is_none() => return Err(StatusCode::BAD_REQUEST),
        UserRole::Admin if staff_id.is_none() => return Err(StatusCode::BAD_REQUEST),
        _ => {}
    }

    let new_user = NewUser {
        email: payload.email,
        full_name: payload.full_name,
        role: payload.role,
        is_active: payload.is_active,
        hashed_password: hash_or_500(&payload.password)?,
        matric_number,
        department: payload.department,
        staff_id,
    };

    state
        .repo
        .create_user(new_user)
        .await
        .map(Json)
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// list_users
///
/// [Admin Route] Every registered user.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, StatusCode> {
    if !user.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.list_users().await))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me/preferences",
    responses((status = 200, description = "Preferred categories", body = PreferencesResponse))
)]
pub async fn get_preferences(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PreferencesResponse>, StatusCode> {
    let user = state.repo.get_user(id).await.ok_or(StatusCode::UNAUTHORIZED)?;
    Ok(Json(PreferencesResponse {
        preferred_categories: user.preferred_categories,
    }))
}

/// update_preferences
///
/// [Authenticated Route] Replaces the caller's preferred categories. Values are
/// stored as given; they only act as a filter for the recommendation feed.
#[utoipa::path(
    put,
    path = "/api/v1/users/me/preferences",
    request_body = [String],
    responses((status = 200, description = "Updated", body = MessageResponse))
)]
pub async fn update_preferences(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(categories): Json<Vec<String>>,
) -> Result<Json<MessageResponse>, StatusCode> {
    if state.repo.set_preferred_categories(id, categories).await {
        Ok(Json(MessageResponse::new("Preferences updated successfully")))
    } else {
        Err(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me/department",
    responses((status = 200, description = "Department", body = DepartmentResponse))
)]
pub async fn get_department(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DepartmentResponse>, StatusCode> {
    let user = state.repo.get_user(id).await.ok_or(StatusCode::UNAUTHORIZED)?;
    Ok(Json(DepartmentResponse {
        department: user.department,
    }))
}

// --- News ---

/// classify_text
///
/// [Authenticated Route] Runs the configured classifier on arbitrary text
/// without storing anything.
#[utoipa::path(
    post,
    path = "/api/v1/news/classify",
    request_body = ClassificationRequest,
    responses(
        (status = 200, description = "Classification", body = ClassificationResult),
        (status = 400, description = "Empty text"),
        (status = 503, description = "Model service is not available")
    )
)]
pub async fn classify_text(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ClassificationRequest>,
) -> Result<Json<ClassificationResult>, StatusCode> {
    state
        .classifier
        .classify(&payload.text)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("classification error: {}", e);
            classifier_status(&e)
        })
}

/// create_news
///
/// [Admin Route] Publishes an article. The category comes from the classifier;
/// if classification fails for any reason the article is still stored, as
/// `Uncategorized` with a confidence of 0.0.
#[utoipa::path(
    post,
    path = "/api/v1/news",
    request_body = CreateNewsRequest,
    responses(
        (status = 200, description = "Created", body = News),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_news(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateNewsRequest>,
) -> Result<Json<News>, StatusCode> {
    if !user.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    let classification = match state.classifier.classify(&payload.content).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("classification failed, storing article as uncategorized: {}", e);
            ClassificationResult::uncategorized()
        }
    };

    let news = NewNews {
        title: payload.title,
        content: payload.content,
        source: payload.source,
        tags: payload.tags,
        image_url: payload.image_url,
        created_by: user.id,
        category: classification.category,
        confidence_score: classification.confidence,
    };

    state
        .repo
        .create_news(news)
        .await
        .map(Json)
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// update_news
///
/// [Admin Route] Partial update. New content is always reclassified, and
/// unlike creation a classification failure aborts the update: 400 for empty
/// content, 503 otherwise. Nothing is written in either case.
#[utoipa::path(
    put,
    path = "/api/v1/news/{id}",
    params(("id" = Uuid, Path, description = "News ID")),
    request_body = UpdateNewsRequest,
    responses(
        (status = 200, description = "Updated", body = News),
        (status = 404, description = "Not Found"),
        (status = 503, description = "Model service is not available")
    )
)]
pub async fn update_news(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateNewsRequest>,
) -> Result<Json<News>, StatusCode> {
    if !user.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    if state.repo.get_news(id).await.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    let classification = match payload.content.as_deref() {
        Some(content) => Some(state.classifier.classify(content).await.map_err(|e| {
            tracing::error!(news_id = %id, "reclassification failed: {}", e);
            classifier_status(&e)
        })?),
        None => None,
    };

    state
        .repo
        .update_news(id, payload, classification)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[utoipa::path(
    delete,
    path = "/api/v1/news/{id}",
    params(("id" = Uuid, Path, description = "News ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_news(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, StatusCode> {
    if !user.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }
    if state.repo.delete_news(id).await {
        Ok(Json(MessageResponse::new("News article deleted successfully")))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

/// list_news
///
/// [Public Route] Paginated listing of active articles, newest first. Every
/// article returned counts as one view.
#[utoipa::path(
    get,
    path = "/api/v1/news",
    params(NewsFilter),
    responses(
        (status = 200, description = "Page of articles", body = NewsPage),
        (status = 400, description = "Invalid page or limit")
    )
)]
pub async fn list_news(
    State(state): State<AppState>,
    Query(filter): Query<NewsFilter>,
) -> Result<Json<NewsPage>, StatusCode> {
    let page = filter.page.unwrap_or(1);
    let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if page < 1 || !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let query = NewsQuery {
        category: non_blank(filter.category),
        search: non_blank(filter.search),
        page,
        limit,
    };
    if query.checked_offset().is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let result = state.repo.list_news(query).await;

    let ids: Vec<Uuid> = result.items.iter().map(|n| n.id).collect();
    state.repo.increment_views(&ids).await;

    Ok(Json(result))
}

/// get_recommended_news
///
/// [Authenticated Route] Newest articles in the caller's preferred categories,
/// or simply the newest articles when no preference is set.
#[utoipa::path(
    get,
    path = "/api/v1/news/recommended",
    params(RecommendedFilter),
    responses((status = 200, description = "Recommended articles", body = [News]))
)]
pub async fn get_recommended_news(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<RecommendedFilter>,
) -> Result<Json<Vec<News>>, StatusCode> {
    let limit = filter.limit.unwrap_or(DEFAULT_RECOMMENDED);
    if !(1..=MAX_RECOMMENDED).contains(&limit) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let user = state.repo.get_user(id).await.ok_or(StatusCode::UNAUTHORIZED)?;
    Ok(Json(
        state
            .repo
            .recommended_news(&user.preferred_categories, limit)
            .await,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/news/{id}",
    params(("id" = Uuid, Path, description = "News ID")),
    responses(
        (status = 200, description = "Found", body = News),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_news(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<News>, StatusCode> {
    let news = state.repo.get_news(id).await.ok_or(StatusCode::NOT_FOUND)?;
    state.repo.increment_views(&[id]).await;
    Ok(Json(news))
}

#[utoipa::path(
    post,
    path = "/api/v1/news/{id}/like",
    params(("id" = Uuid, Path, description = "News ID")),
    responses(
        (status = 200, description = "Liked", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn like_news(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, StatusCode> {
    if state.repo.like_news(id).await {
        Ok(Json(MessageResponse::new("News article liked successfully")))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
