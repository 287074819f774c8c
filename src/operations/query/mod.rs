pub mod search;

pub use search::{QueryError, QueryResult, QueryService, SearchResponse, SearchResult, VaultInfo};
