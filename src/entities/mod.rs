//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod bank_account;
pub mod settlement;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use bank_account::{
    Column as BankAccountColumn, Entity as BankAccount, Model as BankAccountModel,
};
pub use settlement::{Column as SettlementColumn, Entity as Settlement, Model as SettlementModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
