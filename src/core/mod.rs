/// Bank account records
pub mod bank_account;

/// Stored link list formats
pub mod links;

/// Pure reconciliation rules: exclusivity, derivations, subtotals
pub mod reconcile;

/// Settlement detail reports and display formatting
pub mod report;

/// Settlement persistence
pub mod settlement;

/// Settlement status taxonomy
pub mod status;

/// Trade transaction records
pub mod transaction;
