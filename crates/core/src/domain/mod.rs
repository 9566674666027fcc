pub mod consensus;
pub mod contract;
pub mod prediction;
pub mod quote;
