use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};

use super::{
    avatar::AvatarProvider,
    repo::{NewUser, User, UserStore},
};
use crate::{state::AppState, storage::StorageClient};

/// Creates a user, attaching a looked-up avatar when one is available.
/// A failed lookup leaves the avatar empty.
pub async fn create_user(
    users: &dyn UserStore,
    avatars: &dyn AvatarProvider,
    username: &str,
    email: &str,
    password_hash: &str,
) -> anyhow::Result<User> {
    let avatar = match avatars.lookup(email).await {
        Ok(found) => found,
        Err(e) => {
            warn!(error = %e, "avatar lookup failed; creating user without avatar");
            None
        }
    };
    users
        .create(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            avatar,
        })
        .await
}

pub struct AvatarUpload {
    pub body: Bytes,
    pub content_type: String,
}

/// Stores an uploaded avatar and points the user at it.
pub async fn replace_avatar(st: &AppState, user: &User, upload: AvatarUpload) -> anyhow::Result<User> {
    let ext = ext_from_mime(&upload.content_type).context("unsupported image type")?;
    let key = format!("avatars/{}.{}", user.id, ext);
    upload_object(st.storage.as_ref(), &key, upload).await?;
    let url = st.storage.object_url(&key);

    let updated = st
        .users
        .set_avatar(&user.email, &url)
        .await?
        .context("user vanished while updating avatar")?;
    st.user_cache.invalidate(&user.email);

    if let Some(old_key) = user
        .avatar
        .as_deref()
        .and_then(|old| old.strip_prefix(st.storage.object_url("").as_str()))
        .filter(|old_key| *old_key != key)
    {
        if let Err(e) = st.storage.delete_object(old_key).await {
            warn!(error = %e, key = %old_key, "failed to delete previous avatar");
        }
    }

    info!(user_id = %user.id, "avatar updated");
    Ok(updated)
}

async fn upload_object(storage: &dyn StorageClient, key: &str, upload: AvatarUpload) -> anyhow::Result<()> {
    storage
        .put_object(key, upload.body, &upload.content_type)
        .await
        .with_context(|| format!("put_object {}", key))
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
