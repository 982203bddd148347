use axum::{
    extract::{Query, State},
    Json,
};

use crate::dtos::{MenuListing, MenuQuery};
use crate::error::OrderingError;
use crate::startup::AppState;

/// Menu listing, optionally narrowed to a restaurant and a stock scope.
pub async fn list_menu(
    State(state): State<AppState>,
    Query(query): Query<MenuQuery>,
) -> Result<Json<Vec<MenuListing>>, OrderingError> {
    let items = state
        .store
        .list_menu_items(query.restaurant_id, query.stock)
        .await?;

    Ok(Json(items.into_iter().map(MenuListing::from).collect()))
}
