//! Durable storage for stream chat.

use super::error::Error;
use entity::stream_chat_messages::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder, QuerySelect};

/// Inserts a chat message. The id and timestamp are assigned by the caller so that the
/// durable and in-memory copies of a message agree.
pub async fn create(db: &DatabaseConnection, message: Model) -> Result<Model, Error> {
    debug!("Persisting chat message {} for stream {}", message.id, message.stream_id);

    let active_model = ActiveModel {
        id: Set(message.id),
        stream_id: Set(message.stream_id),
        user_id: Set(message.user_id),
        username: Set(message.username),
        message: Set(message.message),
        created_at: Set(message.created_at),
    };

    Ok(active_model.insert(db).await?)
}

/// Finds the most recent messages of a stream, newest first
pub async fn find_recent_by_stream_id(
    db: &DatabaseConnection,
    stream_id: &str,
    limit: u64,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::StreamId.eq(stream_id))
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id)
        .limit(limit)
        .all(db)
        .await?)
}

/// Finds a chat message by id
pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use crate::error::EntityApiErrorKind;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, RuntimeErr};

    fn message(text: &str) -> Model {
        Model {
            id: Id::new_v4(),
            stream_id: "stream-42".to_string(),
            user_id: "user-7".to_string(),
            username: "Viewer".to_string(),
            message: text.to_string(),
            created_at: chrono::Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn find_recent_returns_rows_as_stored() -> Result<(), Error> {
        let newest = message("second");
        let oldest = message("first");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![newest.clone(), oldest.clone()]])
            .into_connection();

        let rows = find_recent_by_stream_id(&db, "stream-42", 50).await?;
        assert_eq!(rows, vec![newest, oldest]);
        Ok(())
    }

    #[tokio::test]
    async fn create_on_a_missing_table_is_a_missing_relation() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors(vec![DbErr::Query(RuntimeErr::Internal(
                "relation \"asgard.stream_chat_messages\" does not exist".to_string(),
            ))])
            .into_connection();

        let err = create(&db, message("hi")).await.unwrap_err();
        assert_eq!(err.error_kind, EntityApiErrorKind::MissingRelation);
    }
}
