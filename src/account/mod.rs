pub mod model;
pub mod password;
pub mod profile;
pub mod service;
pub mod session;
pub mod store;
