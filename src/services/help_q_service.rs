// ==================== HELP QUEUE ====================
// Help desk requests. Every request is a new item; chat messages are
// appended to the item's transcript in arrival order.

use uuid::Uuid;

use crate::{
    models::HelpQ,
    store::{EntityStore, FetchRequest},
    utils::AppError,
};

pub async fn create_help_q_item(
    store: &EntityStore,
    technology: &str,
    language: &str,
    location: &str,
    description: &str,
) -> Result<HelpQ, AppError> {
    if description.trim().is_empty() {
        return Err(AppError::InvalidRequest("description is required".to_string()));
    }

    let item = HelpQ::new(technology, language, location, description);

    let mut tx = store.begin().await;
    tx.insert_help_q(item.clone());
    tx.commit()?;

    store.save_in_background();
    log::info!("🙋 Help request {} created ({} / {})", item.id, item.technology, item.language);

    Ok(item)
}

pub async fn push_chat_item(store: &EntityStore, id: Uuid, author: &str, message: &str) -> Result<HelpQ, AppError> {
    if message.trim().is_empty() {
        return Err(AppError::InvalidRequest("message is required".to_string()));
    }

    let mut tx = store.begin().await;
    let item = tx
        .update_help_q(&id, |item| item.push_chat_item(author, message))
        .ok_or_else(|| AppError::NotFound(format!("help request {}", id)))?;
    tx.commit()?;

    store.save_in_background();
    log::debug!("💬 Chat message added to help request {} ({} total)", id, item.chats.len());

    Ok(item)
}

/// All help requests, oldest first
pub async fn list_help_q(store: &EntityStore) -> Vec<HelpQ> {
    store
        .load_with(|request: &mut FetchRequest<HelpQ>| {
            request.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        })
        .await
}
