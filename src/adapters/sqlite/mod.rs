//! SQLite adapters for the conversation source and evaluation sink.

pub mod connection;
pub mod conversation_source;
pub mod evaluation_sink;
pub mod migrations;

pub use connection::{
    create_pool, create_pool_from_config, create_test_pool, database_url, verify_connection,
    ConnectionError, PoolConfig,
};
pub use conversation_source::SqliteConversationSource;
pub use evaluation_sink::SqliteEvaluationSink;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};

/// Quote a table name for interpolation into SQL.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("evaluations"), "\"evaluations\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
