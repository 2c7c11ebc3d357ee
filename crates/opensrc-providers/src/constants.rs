//! Provider-internal tuning constants not exposed via `opensrc_domain`.

/// EdgeVec HNSW: max connections per node in layers > 0.
pub const EDGEVEC_HNSW_M: u32 = 16;
/// EdgeVec HNSW: max connections per node in layer 0.
pub const EDGEVEC_HNSW_M0: u32 = 32;
/// EdgeVec HNSW: construction-time candidate list size.
pub const EDGEVEC_HNSW_EF_CONSTRUCTION: u32 = 200;
/// EdgeVec HNSW: search-time candidate list size.
pub const EDGEVEC_HNSW_EF_SEARCH: u32 = 64;

/// Registry/git HTTP client timeout.
pub const FETCH_HTTP_TIMEOUT_SECS: u64 = 30;

/// npm registry base URL.
pub const NPM_REGISTRY_BASE: &str = "https://registry.npmjs.org";
/// PyPI JSON API base URL.
pub const PYPI_BASE: &str = "https://pypi.org/pypi";
/// crates.io API base URL.
pub const CRATES_IO_BASE: &str = "https://crates.io/api/v1/crates";
