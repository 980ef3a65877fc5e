pub mod balance;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod locks;
pub mod models;
pub mod services;
pub mod simplify;
