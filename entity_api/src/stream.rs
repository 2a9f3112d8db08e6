//! Read access to the streams catalog.

use super::error::Error;
use entity::streams::{Entity, Model};
use sea_orm::{entity::prelude::*, DatabaseConnection};

/// Finds a stream by its id
pub async fn find_by_id(db: &DatabaseConnection, id: &str) -> Result<Model, Error> {
    Entity::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}
