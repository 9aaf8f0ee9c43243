//! CRM: customers and their contacts, leads, opportunities and activities,
//! plus the room reservation side business.

use crate::domain::schema::{Catalog, FieldDef, RelationDef, ResourceSchema};

const LEAD_SOURCES: &[&str] = &["Website", "Referral", "Advertisement", "Event", "Other"];
const LEAD_STATUSES: &[&str] = &["New", "Contacted", "Qualified", "Lost"];
const OPPORTUNITY_STAGES: &[&str] = &[
    "Prospecting",
    "Qualification",
    "Proposal",
    "Negotiation",
    "ClosedWon",
    "ClosedLost",
];
const ROOM_TYPES: &[&str] = &["Single", "Double", "Suite"];
const RESERVATION_STATUSES: &[&str] = &["Pending", "Confirmed", "Cancelled", "Completed"];
const PAYMENT_METHODS: &[&str] = &["CreditCard", "Cash", "BankTransfer"];
const USER_ROLES: &[&str] = &["Admin", "Manager", "Agent"];

pub static CRM: Catalog = Catalog {
    name: "crm",
    resources: &[
        ResourceSchema {
            name: "Customer",
            path: "customers",
            table: "customers",
            fields: &[
                FieldDef::text("name", "name"),
                FieldDef::free_text("email", "email"),
                FieldDef::text("phone", "phone"),
                FieldDef::text("address", "address"),
            ],
            relations: &[
                RelationDef::has_many("activities", "Activity", "customer"),
                RelationDef::has_many("contacts", "Contact", "customer"),
                RelationDef::has_many("leads", "Lead", "customer"),
                RelationDef::has_many("opportunities", "Opportunity", "customer"),
                RelationDef::has_many("reservations", "Reservation", "customer"),
            ],
        },
        ResourceSchema {
            name: "Contact",
            path: "contacts",
            table: "contacts",
            fields: &[
                FieldDef::text("firstName", "first_name"),
                FieldDef::text("lastName", "last_name"),
                FieldDef::free_text("email", "email"),
                FieldDef::text("phone", "phone"),
            ],
            relations: &[
                RelationDef::belongs_to("customer", "Customer", "customer_id"),
                RelationDef::has_many("activities", "Activity", "contact"),
            ],
        },
        ResourceSchema {
            name: "Lead",
            path: "leads",
            table: "leads",
            fields: &[
                FieldDef::text("name", "name"),
                FieldDef::free_text("email", "email"),
                FieldDef::one_of("source", "source", LEAD_SOURCES),
                FieldDef::one_of("status", "status", LEAD_STATUSES),
            ],
            relations: &[
                RelationDef::belongs_to("customer", "Customer", "customer_id"),
                RelationDef::has_many("activities", "Activity", "lead"),
            ],
        },
        ResourceSchema {
            name: "Opportunity",
            path: "opportunities",
            table: "opportunities",
            fields: &[
                FieldDef::text("name", "name"),
                FieldDef::float("amount", "amount"),
                FieldDef::datetime("closeDate", "close_date"),
                FieldDef::one_of("stage", "stage", OPPORTUNITY_STAGES),
            ],
            relations: &[
                RelationDef::belongs_to("customer", "Customer", "customer_id"),
                RelationDef::has_many("activities", "Activity", "opportunity"),
            ],
        },
        ResourceSchema {
            name: "Activity",
            path: "activities",
            table: "activities",
            fields: &[
                FieldDef::datetime("activityDate", "activity_date"),
                FieldDef::text("description", "description"),
                FieldDef::text("relatedTo", "related_to"),
                FieldDef::text("subject", "subject"),
            ],
            relations: &[
                RelationDef::belongs_to("contact", "Contact", "contact_id"),
                RelationDef::belongs_to("customer", "Customer", "customer_id"),
                RelationDef::belongs_to("lead", "Lead", "lead_id"),
                RelationDef::belongs_to("opportunity", "Opportunity", "opportunity_id"),
            ],
        },
        ResourceSchema {
            name: "Room",
            path: "rooms",
            table: "rooms",
            fields: &[
                FieldDef::text("roomNumber", "room_number"),
                FieldDef::float("price", "price"),
                FieldDef::one_of("typeField", "type_field", ROOM_TYPES),
            ],
            relations: &[RelationDef::has_many("reservations", "Reservation", "room")],
        },
        ResourceSchema {
            name: "Reservation",
            path: "reservations",
            table: "reservations",
            fields: &[
                FieldDef::datetime("reservationDate", "reservation_date"),
                FieldDef::int("numberOfGuests", "number_of_guests"),
                FieldDef::one_of("status", "status", RESERVATION_STATUSES),
            ],
            relations: &[
                RelationDef::belongs_to("customer", "Customer", "customer_id"),
                RelationDef::belongs_to("room", "Room", "room_id"),
                RelationDef::has_many("payments", "Payment", "reservation"),
                RelationDef::has_many("services", "Service", "reservation"),
            ],
        },
        ResourceSchema {
            name: "Service",
            path: "services",
            table: "services",
            fields: &[
                FieldDef::text("serviceName", "service_name"),
                FieldDef::text("description", "description"),
                FieldDef::float("price", "price"),
            ],
            relations: &[RelationDef::belongs_to("reservation", "Reservation", "reservation_id")],
        },
        ResourceSchema {
            name: "Payment",
            path: "payments",
            table: "payments",
            fields: &[
                FieldDef::float("amount", "amount"),
                FieldDef::one_of("method", "method", PAYMENT_METHODS),
                FieldDef::datetime("paymentDate", "payment_date"),
            ],
            relations: &[RelationDef::belongs_to("reservation", "Reservation", "reservation_id")],
        },
        ResourceSchema {
            name: "User",
            path: "users",
            table: "users",
            fields: &[
                FieldDef::text("username", "username"),
                FieldDef::free_text("email", "email"),
                FieldDef::one_of("role", "role", USER_ROLES),
            ],
            relations: &[],
        },
    ],
};
