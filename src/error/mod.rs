use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Learning engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed: {message}")]
    Serialization { message: String },
}

/// Learning engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Learning engine not configured")]
    NotConfigured,

    #[error("Learning engine unavailable: {message}")]
    Unavailable { message: String },

    #[error("Learning engine call `{operation}` timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Learning engine rejected request: {message}")]
    Rejected { message: String },

    #[error("Learning engine internal error: {message}")]
    Internal { message: String },
}

/// Embedding provider errors
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("Embedding request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Embedding generation failed: {message}")]
    Failed { message: String },
}

/// Vector store errors
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("Vector store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Vector store call `{operation}` timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Insert into {collection} failed: {message}")]
    Insert { collection: String, message: String },

    #[error("Search failed: {message}")]
    Search { message: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for learning engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Result type alias for vector store operations
pub type VectorStoreResult<T> = Result<T, VectorStoreError>;
