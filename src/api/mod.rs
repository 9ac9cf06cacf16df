//! REST API for carts, line items and payment.
//!
//! Every route requires the `X-User-Id` header.
//! - `POST /orders` open (or reuse) an empty cart
//! - `GET /orders`, `GET|PATCH|DELETE /orders/{order_id}`
//! - `GET|POST /orders/{order_id}/items`
//! - `GET|PATCH|DELETE /orders/{order_id}/items/{item_id}`
//! - `POST /orders/{order_id}/pay`

mod auth;
mod errors;
mod handlers;

use actix_web::web;

/// Register the order routes (separated for testing).
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(errors::json_error_handler))
        .app_data(web::PathConfig::default().error_handler(errors::path_error_handler))
        .service(
            web::scope("/orders")
                .route("", web::post().to(handlers::open_cart))
                .route("", web::get().to(handlers::list_orders))
                .route("/{order_id}", web::get().to(handlers::get_order))
                .route("/{order_id}", web::patch().to(handlers::update_order))
                .route("/{order_id}", web::delete().to(handlers::delete_order))
                .route("/{order_id}/pay", web::post().to(handlers::pay_order))
                .route("/{order_id}/items", web::get().to(handlers::list_items))
                .route("/{order_id}/items", web::post().to(handlers::add_item))
                .route("/{order_id}/items/{item_id}", web::get().to(handlers::get_item))
                .route("/{order_id}/items/{item_id}", web::patch().to(handlers::update_item))
                .route("/{order_id}/items/{item_id}", web::delete().to(handlers::remove_item)),
        );
}
