//! # Catalogs
//!
//! The three business domains served by this crate. Each catalog is a
//! static list of resource schemas; one process serves exactly one of them,
//! chosen by the `backend.catalog` setting.

mod car_rental;
mod crm;
mod reservation;

pub use car_rental::CAR_RENTAL;
pub use crm::CRM;
pub use reservation::RESERVATION;

use super::schema::Catalog;

/// Every catalog known to the server.
pub static ALL_CATALOGS: [&Catalog; 3] = [&CAR_RENTAL, &CRM, &RESERVATION];
