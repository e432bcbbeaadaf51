//! Pushes lost items the AI Layer has not acknowledged yet, either on a
//! schedule or on demand from the admin API.

use std::time::Duration;

use anyhow::Result;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use unylost_db::models::LostItemRow;
use unylost_types::api::{SyncDetail, SyncReport};

use crate::ai_layer::{ImageUpload, LostItemDocument, Registration};
use crate::state::{AppState, blocking};
use crate::storage::UPLOADS_PREFIX;

/// Registers a lost item with the AI Layer. A local image still on disk is
/// uploaded; a missing one degrades to a text-only registration, and a
/// remote image is passed along by URL.
pub(crate) async fn register_lost_item(state: &AppState, item: &LostItemRow) -> Result<Registration> {
    let image_url = item.image_url.as_deref().filter(|u| !u.is_empty());

    let mut upload = None;
    if let Some(url) = image_url.filter(|u| u.starts_with(UPLOADS_PREFIX)) {
        match state.storage.read(url).await {
            Some((data, content_type)) => {
                let file_name = url.rsplit('/').next().unwrap_or("image.jpg").to_string();
                upload = Some(ImageUpload { file_name, content_type, data });
            }
            None => warn!(
                "Image {} of lost item {} is missing, registering text only",
                url, item.id
            ),
        }
    }

    let status = item.status();
    let doc = LostItemDocument {
        item_name: &item.item_name,
        description: item.description.as_deref().unwrap_or_default(),
        last_seen_location: &item.last_seen_location,
        category: &item.category_name,
        date_lost: &item.lost_date,
        owner_id: item.user_id,
        reward: item.reward.as_deref().unwrap_or_default(),
        status: status.as_str(),
        local_id: item.id,
        image_url: image_url.filter(|u| u.starts_with("http")),
    };

    match upload {
        Some(file) => state.ai.add_lost_item(&doc, &file).await,
        None => state.ai.add_lost_item_text(&doc).await,
    }
}

/// Drops the local copy of an image once the AI Layer hosts a replacement.
pub(crate) async fn discard_replaced_image(state: &AppState, old: Option<&str>, new: Option<&str>) {
    if let (Some(old), Some(new)) = (old, new) {
        if old != new {
            state.storage.remove_url(old).await;
        }
    }
}

/// Synchronizes up to `limit` pending lost items, newest first. Items are
/// processed one by one and a failure never stops the run.
pub async fn sync_lost_items(state: &AppState, limit: u32) -> SyncReport {
    let items = match blocking(state, move |db| db.lost_items_needing_sync(limit)).await {
        Ok(items) => items,
        Err(e) => {
            error!("Could not load lost items to sync: {}", e);
            return SyncReport {
                success: false,
                error: Some(e.to_string()),
                ..Default::default()
            };
        }
    };

    let mut report = SyncReport { success: true, ..Default::default() };
    if items.is_empty() {
        return report;
    }
    info!("Syncing {} lost items with the AI Layer", items.len());

    for item in items {
        let id = item.id;
        let outcome = match register_lost_item(state, &item).await {
            Ok(reg) => {
                let firestore_id = reg.item_id.clone();
                let image_url = reg.image_url.clone();
                blocking(state, move |db| db.mark_synced(id, &firestore_id, image_url.as_deref()))
                    .await
                    .map(|_| reg)
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(format!("{:#}", e)),
        };

        match outcome {
            Ok(reg) => {
                discard_replaced_image(state, item.image_url.as_deref(), reg.image_url.as_deref()).await;
                report.synchronized += 1;
                report.details.push(SyncDetail {
                    id,
                    item_name: item.item_name,
                    status: "success",
                    firestore_id: Some(reg.item_id),
                    error: None,
                });
            }
            Err(message) => {
                warn!("Sync failed for lost item {}: {}", id, message);
                let stored = message.clone();
                if let Err(e) = blocking(state, move |db| db.mark_sync_failed(id, &stored)).await {
                    error!("Could not record sync failure for lost item {}: {}", id, e);
                }
                report.failed += 1;
                report.details.push(SyncDetail {
                    id,
                    item_name: item.item_name,
                    status: "failed",
                    firestore_id: None,
                    error: Some(message),
                });
            }
        }
    }

    info!(
        "Lost item sync finished: {} synchronized, {} failed",
        report.synchronized, report.failed
    );
    report
}

/// Scheduled sync. The first tick fires immediately, so pending items are
/// retried right after start-up.
pub async fn run_sync_loop(state: AppState) {
    let period = Duration::from_secs(state.config.sync_interval_secs.max(1));
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let report = sync_lost_items(&state, state.config.sync_batch).await;
        if !report.success {
            error!("Scheduled lost item sync failed: {}", report.error.unwrap_or_default());
        }
    }
}
