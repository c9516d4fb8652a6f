pub mod domain_table;
pub mod terms;

pub use domain_table::{DomainTable, GENERAL_INTENT};
