//! Google Sheets values API adapter for the roster core.
//!
//! [`SheetsClient`] implements [`rollcall_core::TabularStore`] over the v4
//! `spreadsheets.values` endpoints: `get`, `update` with `RAW` input and
//! `clear`.

pub mod client;

pub use client::{SheetsClient, SheetsClientError};
