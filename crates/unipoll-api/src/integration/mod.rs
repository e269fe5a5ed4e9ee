// Integration API client for the UniFi Network Application.
//
// Read-only subset of the official API: info, sites, devices (+ detail
// and latest statistics), clients, and WAN interfaces.
// Uses X-API-Key authentication and JSON REST endpoints at /integration/v1/.

pub mod client;
pub mod types;

pub use client::{DEFAULT_DATA_KEY, IntegrationClient, PAGE_LIMIT};
