//! Car rental: customers, orders, products and back-office users.

use crate::domain::schema::{Catalog, FieldDef, RelationDef, ResourceSchema};

pub static CAR_RENTAL: Catalog = Catalog {
    name: "car_rental",
    resources: &[
        ResourceSchema {
            name: "Customer",
            path: "customers",
            table: "customers",
            fields: &[
                FieldDef::text("name", "name"),
                FieldDef::free_text("email", "email"),
            ],
            relations: &[RelationDef::has_many("orders", "Order", "customer")],
        },
        ResourceSchema {
            name: "Order",
            path: "orders",
            table: "orders",
            fields: &[
                FieldDef::datetime("orderDate", "order_date"),
                FieldDef::text("status", "status"),
                FieldDef::float("total", "total"),
            ],
            relations: &[
                RelationDef::belongs_to("orderItem", "OrderItem", "order_item_id"),
                RelationDef::belongs_to("customer", "Customer", "customer_id"),
            ],
        },
        ResourceSchema {
            name: "OrderItem",
            path: "orderItems",
            table: "order_items",
            fields: &[
                FieldDef::float("price", "price"),
                FieldDef::int("quantity", "quantity"),
            ],
            relations: &[
                RelationDef::belongs_to("product", "Product", "product_id"),
                RelationDef::has_many("orders", "Order", "orderItem"),
            ],
        },
        ResourceSchema {
            name: "Product",
            path: "products",
            table: "products",
            fields: &[
                FieldDef::text("name", "name"),
                FieldDef::text("description", "description"),
                FieldDef::float("price", "price"),
                FieldDef::int("stock", "stock"),
            ],
            relations: &[RelationDef::has_many("orderItems", "OrderItem", "product")],
        },
        ResourceSchema {
            name: "Role",
            path: "roles",
            table: "roles",
            fields: &[
                FieldDef::text("name", "name"),
                FieldDef::text("description", "description"),
            ],
            relations: &[RelationDef::has_many("users", "User", "role")],
        },
        ResourceSchema {
            name: "User",
            path: "users",
            table: "users",
            fields: &[
                FieldDef::text("username", "username"),
                FieldDef::free_text("email", "email"),
                FieldDef::secret("password", "password"),
            ],
            relations: &[RelationDef::belongs_to("role", "Role", "role_id")],
        },
    ],
};
