pub mod capture_delegate;
pub mod graph_driver;
