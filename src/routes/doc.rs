use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        Removed,
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartItemAdded, CartView, UpdateCartItemRequest},
        categories::{CategoryList, CategoryRequest},
        dashboard::DashboardStats,
        orders::{CreateOrderRequest, OrderDetails, OrderLineRequest, OrderList},
        payments::{PaymentList, PaymentRequest},
        products::{CreateProductRequest, ProductList, StockAdjustRequest, UpdateProductRequest},
        users::{UpdateProfileRequest, UpdateRoleRequest, UserList},
    },
    models::{
        Cart, CartItem, CartLine, Category, CategorySummary, Order, OrderLine, OrderSummary,
        Payment, Product, Role, User,
    },
    response::{Meta, ResponseStatus},
    routes::{
        auth, cart, categories, dashboard, health, orders, params, payments, products, users,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        users::list_users,
        users::get_user,
        users::update_user,
        users::update_role,
        users::delete_user,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::adjust_stock,
        products::delete_product,
        cart::open_cart,
        cart::get_cart,
        cart::delete_cart,
        cart::add_item,
        cart::list_items,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        orders::create_order,
        orders::checkout,
        orders::list_all_orders,
        orders::list_user_orders,
        orders::get_order,
        orders::delete_order,
        payments::process_payment,
        payments::list_for_order,
        dashboard::dashboard
    ),
    components(
        schemas(
            Role,
            User,
            Category,
            CategorySummary,
            Product,
            Cart,
            CartItem,
            CartLine,
            Order,
            OrderLine,
            OrderSummary,
            Payment,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UpdateProfileRequest,
            UpdateRoleRequest,
            UserList,
            CategoryRequest,
            CategoryList,
            CreateProductRequest,
            UpdateProductRequest,
            StockAdjustRequest,
            ProductList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartItemAdded,
            CartView,
            CreateOrderRequest,
            OrderLineRequest,
            OrderDetails,
            OrderList,
            PaymentRequest,
            PaymentList,
            DashboardStats,
            Removed,
            params::SortOrder,
            params::ProductSortBy,
            ResponseStatus,
            Meta
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and login"),
        (name = "Users", description = "Accounts and roles"),
        (name = "Categories", description = "Catalog categories"),
        (name = "Products", description = "Catalog products and stock"),
        (name = "Cart", description = "Carts and cart lines"),
        (name = "Orders", description = "Orders and checkout"),
        (name = "Payments", description = "Simulated payments"),
        (name = "Dashboard", description = "Admin statistics"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/register",
            "/api/products/{id}/stock",
            "/api/cart-items/{cart_id}/{product_id}",
            "/api/orders/checkout",
            "/api/payments/order/{order_id}",
            "/api/dashboard",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemes = doc.components.as_ref().map(|c| &c.security_schemes);
        assert!(schemes.is_some_and(|s| s.contains_key("bearer_auth")));
    }
}
