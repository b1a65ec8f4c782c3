//! Report contract and wire types shared between the auditor client and its host apps.

pub mod domain;
pub mod error;
pub mod protocol;
