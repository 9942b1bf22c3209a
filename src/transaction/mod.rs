mod transaction;

pub use transaction::TransactionManager;
