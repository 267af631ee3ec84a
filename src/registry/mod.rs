//! Registry module for Docker registry interactions
//!
//! This module provides the read-only Docker Registry HTTP API v2 client used
//! by the catalog refresher, the token providers it authenticates with, and
//! the scope filter that decides which repositories are public.

pub mod client;
pub mod scope;
pub mod token;

pub use client::{CatalogSource, RegistryClient, RegistryClientBuilder};
pub use scope::{ScopeFilter, ScopeRequest, is_scope_public};
pub use token::{RealmTokenProvider, StaticTokenProvider, TokenProvider};
