//! Contract tests for each analysis pass, run through the public API.

pub mod common;

mod aggregate_contract;
mod attributes_contract;
mod join_contract;
mod ordering_contract;
mod typing_contract;
