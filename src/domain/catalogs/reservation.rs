//! Reservation management: rooms, guests, bookings, payments and reviews.

use crate::domain::schema::{Catalog, FieldDef, RelationDef, ResourceSchema};

const RESERVATION_STATUSES: &[&str] = &["Pending", "Confirmed", "Cancelled", "Completed"];
const PAYMENT_STATUSES: &[&str] = &["Pending", "Paid", "Refunded", "Failed"];

pub static RESERVATION: Catalog = Catalog {
    name: "reservation",
    resources: &[
        ResourceSchema {
            name: "User",
            path: "users",
            table: "users",
            fields: &[
                FieldDef::text("username", "username"),
                FieldDef::text("firstName", "first_name"),
                FieldDef::text("lastName", "last_name"),
                FieldDef::free_text("email", "email"),
                FieldDef::secret("password", "password"),
            ],
            relations: &[
                RelationDef::has_many("reservations", "Reservation", "user"),
                RelationDef::has_many("reviews", "Review", "user"),
            ],
        },
        ResourceSchema {
            name: "Room",
            path: "rooms",
            table: "rooms",
            fields: &[
                FieldDef::int("roomNumber", "room_number"),
                FieldDef::text("typeField", "type_field"),
                FieldDef::float("pricePerNight", "price_per_night"),
                FieldDef::boolean("isAvailable", "is_available"),
            ],
            relations: &[RelationDef::has_many("reservations", "Reservation", "room")],
        },
        ResourceSchema {
            name: "Reservation",
            path: "reservations",
            table: "reservations",
            fields: &[
                FieldDef::datetime("reservationDate", "reservation_date"),
                FieldDef::datetime("startDate", "start_date"),
                FieldDef::datetime("endDate", "end_date"),
                FieldDef::one_of("status", "status", RESERVATION_STATUSES),
            ],
            relations: &[
                RelationDef::belongs_to("room", "Room", "room_id"),
                RelationDef::belongs_to("user", "User", "user_id"),
                RelationDef::has_many("payments", "Payment", "reservation"),
                RelationDef::has_many("reviews", "Review", "reservation"),
            ],
        },
        ResourceSchema {
            name: "Review",
            path: "reviews",
            table: "reviews",
            fields: &[
                FieldDef::int("rating", "rating"),
                FieldDef::text("comment", "comment"),
                FieldDef::datetime("date", "date"),
            ],
            relations: &[
                RelationDef::belongs_to("reservation", "Reservation", "reservation_id"),
                RelationDef::belongs_to("user", "User", "user_id"),
            ],
        },
        ResourceSchema {
            name: "Payment",
            path: "payments",
            table: "payments",
            fields: &[
                FieldDef::float("amount", "amount"),
                FieldDef::datetime("paymentDate", "payment_date"),
                FieldDef::one_of("status", "status", PAYMENT_STATUSES),
            ],
            relations: &[RelationDef::belongs_to("reservation", "Reservation", "reservation_id")],
        },
    ],
};
