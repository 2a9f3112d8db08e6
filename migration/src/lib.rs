pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_schema_and_base_db_setup;
mod m20260301_000002_create_stream_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_schema_and_base_db_setup::Migration),
            Box::new(m20260301_000002_create_stream_tables::Migration),
        ]
    }
}
