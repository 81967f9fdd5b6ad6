//! Solr implementation of the search index provider.

pub mod document;
mod provider;

pub use provider::SolrProvider;
