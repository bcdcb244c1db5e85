/// API routes and handlers
pub mod assets;
pub mod health;
pub mod identity;
pub mod locales;
pub mod middleware;
pub mod verify;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes(ctx: AppContext) -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(identity::routes())
        .merge(assets::routes())
        .merge(locales::routes())
        .merge(verify::routes(ctx))
}
