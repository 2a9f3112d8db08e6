use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("CREATE SCHEMA IF NOT EXISTS asgard;")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("SET search_path TO asgard, public;")
            .await?;

        // The service connects as `asgard`; it owns everything it creates in the schema
        manager
            .get_connection()
            .execute_unprepared(r#"
                DO $$ BEGIN
                    GRANT ALL ON SCHEMA asgard TO asgard;

                    ALTER DEFAULT PRIVILEGES IN SCHEMA asgard GRANT ALL ON TABLES TO asgard;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA asgard GRANT ALL ON SEQUENCES TO asgard;
                END $$;
            "#)
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(r#"
                DO $$ BEGIN
                    ALTER DEFAULT PRIVILEGES IN SCHEMA asgard REVOKE ALL ON SEQUENCES FROM asgard;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA asgard REVOKE ALL ON TABLES FROM asgard;
                    REVOKE ALL ON SCHEMA asgard FROM asgard;
                END $$;
            "#)
            .await?;

        // Drop the schema (CASCADE will remove all objects in it)
        manager
            .get_connection()
            .execute_unprepared("DROP SCHEMA IF EXISTS asgard CASCADE;")
            .await?;

        Ok(())
    }
}
