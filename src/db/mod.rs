//! Database layer

pub mod mongo;

pub use mongo::MongoClient;
