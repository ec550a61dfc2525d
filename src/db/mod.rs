pub mod ledger;
pub mod memory;
pub mod store;
pub mod tx;
pub mod user;
pub mod utils;
pub mod wallet;
