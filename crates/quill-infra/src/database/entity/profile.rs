//! Profile entity for SeaORM.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub user_id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub bio: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for quill_core::domain::Profile {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            bio: model.bio,
            avatar_url: model.avatar_url,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<quill_core::domain::Profile> for ActiveModel {
    fn from(profile: quill_core::domain::Profile) -> Self {
        Self {
            id: Set(profile.id),
            user_id: Set(profile.user_id),
            bio: Set(profile.bio),
            avatar_url: Set(profile.avatar_url),
            created_at: Set(profile.created_at.into()),
            updated_at: Set(profile.updated_at.into()),
        }
    }
}
