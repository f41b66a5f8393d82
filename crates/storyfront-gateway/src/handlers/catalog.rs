use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use storyfront_core::StoryPage;
use storyfront_platform::CreatorListResponse;

use crate::{AppState, error::ApiError};

pub const DEFAULT_STORY_LIMIT: usize = 20;
pub const MAX_STORY_LIMIT: usize = 50;

/// Raw query parameters; parsed by hand so bad values get a JSON 400.
#[derive(Debug, Default, Deserialize)]
pub struct ListStoriesQuery {
    cursor: Option<String>,
    limit: Option<String>,
}

fn parse_limit(raw: Option<&str>) -> Result<usize, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(DEFAULT_STORY_LIMIT);
    };

    match raw.parse::<usize>() {
        Ok(limit) if (1..=MAX_STORY_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(ApiError::BadRequest(format!(
            "limit must be an integer between 1 and {MAX_STORY_LIMIT}"
        ))),
    }
}

pub async fn list_creators(
    State(state): State<AppState>,
) -> Result<Json<CreatorListResponse>, ApiError> {
    let items = state.catalog.list_creators().await?;
    Ok(Json(CreatorListResponse { items }))
}

pub async fn list_stories(
    State(state): State<AppState>,
    Query(query): Query<ListStoriesQuery>,
) -> Result<Json<StoryPage>, ApiError> {
    let limit = parse_limit(query.limit.as_deref())?;
    let cursor = query
        .cursor
        .as_deref()
        .map(str::trim)
        .filter(|cursor| !cursor.is_empty());

    let page = state.catalog.list_stories(cursor, limit).await?;
    Ok(Json(page))
}
