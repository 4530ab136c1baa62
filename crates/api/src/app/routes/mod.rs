use axum::Router;

pub mod batches;
pub mod forecast;
pub mod products;
pub mod recalls;
pub mod reports;
pub mod sales;
pub mod system;
pub mod transactions;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/batches", batches::router())
        .nest("/sales", sales::router())
        .nest("/returns", sales::returns_router())
        .nest("/transactions", transactions::router())
        .nest("/reports", reports::router())
        .nest("/recalls", recalls::router())
        .nest("/forecast", forecast::router())
}
