pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryIdentityRepository;
pub use postgres::PostgresIdentityRepository;
