pub mod connection;
pub mod repository;

pub use connection::init_testgen_db;
pub use repository::TestGenRepository;
