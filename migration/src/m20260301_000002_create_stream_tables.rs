use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // Stream catalog, maintained by the streaming service
        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS asgard.streams (
                id VARCHAR(128) PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                stream_type VARCHAR(64) NOT NULL DEFAULT 'civilian',
                status VARCHAR(32) NOT NULL DEFAULT 'offline',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .await?;

        db.execute_unprepared("ALTER TABLE asgard.streams OWNER TO asgard")
            .await?;

        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS asgard.stream_sessions (
                id UUID PRIMARY KEY,
                stream_id VARCHAR(128) NOT NULL REFERENCES asgard.streams(id) ON DELETE CASCADE,
                user_id VARCHAR(255) NOT NULL,
                auth_token CHAR(64) NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .await?;

        db.execute_unprepared("ALTER TABLE asgard.stream_sessions OWNER TO asgard")
            .await?;

        // Used by the periodic purge
        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS stream_sessions_expires_at_idx
                ON asgard.stream_sessions (expires_at)",
        )
        .await?;

        // No foreign key: chat may be attached to streams announced elsewhere
        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS asgard.stream_chat_messages (
                id UUID PRIMARY KEY,
                stream_id VARCHAR(128) NOT NULL,
                user_id VARCHAR(255) NOT NULL,
                username VARCHAR(255) NOT NULL,
                message TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .await?;

        db.execute_unprepared("ALTER TABLE asgard.stream_chat_messages OWNER TO asgard")
            .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS stream_chat_messages_stream_created_idx
                ON asgard.stream_chat_messages (stream_id, created_at DESC)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP TABLE IF EXISTS asgard.stream_chat_messages")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS asgard.stream_sessions")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS asgard.streams")
            .await?;

        Ok(())
    }
}
