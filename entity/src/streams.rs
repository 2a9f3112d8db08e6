//! SeaORM Entity for the streams table.
//! The catalog is written by the streaming service; this crate only reads it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::streams::Model)]
#[sea_orm(schema_name = "asgard", table_name = "streams")]
pub struct Model {
    /// Stream ids are externally assigned slugs such as `stream-42`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    /// `civilian`, `military`, `interstellar` or any other label (treated as public)
    pub stream_type: String,

    pub status: String,

    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stream_sessions::Entity")]
    StreamSessions,

    #[sea_orm(has_many = "super::stream_chat_messages::Entity")]
    StreamChatMessages,
}

impl Related<super::stream_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StreamSessions.def()
    }
}

impl Related<super::stream_chat_messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StreamChatMessages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
