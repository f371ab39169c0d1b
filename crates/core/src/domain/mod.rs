pub mod advisor;
pub mod customer;
pub mod property;
pub mod request;
