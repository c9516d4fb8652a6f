pub mod date_serde;
pub mod db;
pub mod elastic;
pub mod feedback;
pub mod index;
pub mod models;
pub mod schema;

mod error;

use std::{future::Future, pin::Pin};

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
