//! CRUD operations for the stream_sessions table.

use super::error::Error;
use chrono::{DateTime, Utc};
use entity::stream_sessions::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection};

/// Inserts a newly issued session
pub async fn create(db: &DatabaseConnection, session: Model) -> Result<Model, Error> {
    debug!(
        "Persisting stream session {} for stream {}",
        session.id, session.stream_id
    );

    let active_model = ActiveModel {
        id: Set(session.id),
        stream_id: Set(session.stream_id),
        user_id: Set(session.user_id),
        auth_token: Set(session.auth_token),
        expires_at: Set(session.expires_at),
        created_at: Set(session.created_at),
    };

    Ok(active_model.insert(db).await?)
}

/// Finds a session by id
pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Deletes a session, returning how many rows were removed
pub async fn delete_by_id(db: &DatabaseConnection, id: Id) -> Result<u64, Error> {
    let result = Entity::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected)
}

/// Deletes every session that expired at or before `now`
pub async fn delete_expired(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64, Error> {
    let result = Entity::delete_many()
        .filter(Column::ExpiresAt.lte(now))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
