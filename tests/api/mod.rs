//! REST API endpoint tests

mod health_tests;
mod relation_tests;
mod resource_tests;
