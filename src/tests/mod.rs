// Test modules

pub mod common;

mod detection_engine_test;
mod execution_service_test;
mod recommendation_service_test;
