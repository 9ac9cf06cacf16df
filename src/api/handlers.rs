use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::domain::order::{
    AddLineItem, OrderCommandHandler, OrderError, OrderView, PayOrder, UpdateLineItem, UpdateOrderDetails,
};

use super::auth::CurrentUser;

type Handler = web::Data<OrderCommandHandler>;
type Response = Result<HttpResponse, OrderError>;

// ============================================================================
// Orders
// ============================================================================

/// 201 with a new cart, or 200 when the user's empty cart is reused.
pub async fn open_cart(handler: Handler, CurrentUser(user): CurrentUser) -> Response {
    let (order, created) = handler.open_cart(user).await?;
    let view = OrderView::new(order, Vec::new(), Vec::new());
    if created {
        Ok(HttpResponse::Created().json(view))
    } else {
        Ok(HttpResponse::Ok().json(view))
    }
}

pub async fn list_orders(handler: Handler, CurrentUser(user): CurrentUser) -> Response {
    Ok(HttpResponse::Ok().json(handler.list_orders(user).await?))
}

pub async fn get_order(handler: Handler, CurrentUser(user): CurrentUser, path: web::Path<Uuid>) -> Response {
    Ok(HttpResponse::Ok().json(handler.get_order(user, path.into_inner()).await?))
}

pub async fn update_order(
    handler: Handler,
    CurrentUser(user): CurrentUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateOrderDetails>,
) -> Response {
    let view = handler
        .update_order_details(user, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn delete_order(handler: Handler, CurrentUser(user): CurrentUser, path: web::Path<Uuid>) -> Response {
    handler.delete_order(user, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn pay_order(
    handler: Handler,
    CurrentUser(user): CurrentUser,
    path: web::Path<Uuid>,
    body: web::Json<PayOrder>,
) -> Response {
    let payment = handler
        .complete_payment(user, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(payment))
}

// ============================================================================
// Line items
// ============================================================================

pub async fn list_items(handler: Handler, CurrentUser(user): CurrentUser, path: web::Path<Uuid>) -> Response {
    Ok(HttpResponse::Ok().json(handler.list_line_items(user, path.into_inner()).await?))
}

pub async fn add_item(
    handler: Handler,
    CurrentUser(user): CurrentUser,
    path: web::Path<Uuid>,
    body: web::Json<AddLineItem>,
) -> Response {
    let item = handler
        .add_line_item(user, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(item))
}

pub async fn get_item(
    handler: Handler,
    CurrentUser(user): CurrentUser,
    path: web::Path<(Uuid, Uuid)>,
) -> Response {
    let (order_id, item_id) = path.into_inner();
    Ok(HttpResponse::Ok().json(handler.get_line_item(user, order_id, item_id).await?))
}

pub async fn update_item(
    handler: Handler,
    CurrentUser(user): CurrentUser,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<UpdateLineItem>,
) -> Response {
    let (order_id, item_id) = path.into_inner();
    let item = handler
        .update_line_item(user, order_id, item_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(item))
}

pub async fn remove_item(
    handler: Handler,
    CurrentUser(user): CurrentUser,
    path: web::Path<(Uuid, Uuid)>,
) -> Response {
    let (order_id, item_id) = path.into_inner();
    handler.remove_line_item(user, order_id, item_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
