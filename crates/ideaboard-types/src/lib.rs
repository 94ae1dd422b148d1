pub mod api;
pub mod models;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

pub use api::{
    CommentPatch, IdeaPatch, MessagePatch, NewComment, NewIdea, NewMessage, NewUser, UserPatch,
};
pub use models::{Comment, Idea, Message, User};

/// A record kind backed by one table of the hosted service.
///
/// `New` is the insert payload (no `id`, no `created_at`: both are assigned
/// by the backend). `Patch` carries only the columns a caller wants to
/// change; absent fields are not serialized.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    type New: Serialize + Send + Sync;
    type Patch: Serialize + Send + Sync;

    fn id(&self) -> Uuid;

    /// Every mutable column of this record, for a replace-by-id update.
    fn to_patch(&self) -> Self::Patch;
}

impl Entity for Message {
    const TABLE: &'static str = "messages";
    type New = NewMessage;
    type Patch = MessagePatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_patch(&self) -> MessagePatch {
        MessagePatch {
            user_id: Some(self.user_id),
            content: Some(self.content.clone()),
        }
    }
}

impl Entity for Comment {
    const TABLE: &'static str = "comments";
    type New = NewComment;
    type Patch = CommentPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_patch(&self) -> CommentPatch {
        CommentPatch {
            idea_id: Some(self.idea_id),
            user_id: Some(self.user_id),
            content: Some(self.content.clone()),
        }
    }
}

impl Entity for Idea {
    const TABLE: &'static str = "ideas";
    type New = NewIdea;
    type Patch = IdeaPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_patch(&self) -> IdeaPatch {
        IdeaPatch {
            user_id: Some(self.user_id),
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
        }
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    type New = NewUser;
    type Patch = UserPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_patch(&self) -> UserPatch {
        UserPatch {
            username: Some(self.username.clone()),
            email: Some(self.email.clone()),
        }
    }
}
