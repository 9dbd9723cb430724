/// Image reconciliation
///
/// Moves a post's stored images from their previous state to the state the
/// caller asked for, issuing the minimum set of blob uploads and deletes.
use crate::{
    blob_store::{BlobStore, ImageUpload},
    error::PostResult,
};
use futures::future::try_join_all;
use std::collections::HashSet;

/// URLs in `previous` that are not kept in `desired`, each listed once
pub fn images_to_delete(previous: &[String], desired: &[String]) -> Vec<String> {
    let keep: HashSet<&str> = desired.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();

    previous
        .iter()
        .filter(|url| !keep.contains(url.as_str()) && seen.insert(url.as_str()))
        .cloned()
        .collect()
}

/// Reconcile `owner_id`'s stored blobs and return the final image list.
///
/// All deletes and uploads run concurrently; the first failure fails the
/// whole call and nothing is retried. The result is `desired_urls` followed
/// by the new upload URLs in submission order. Blobs owned by anyone else
/// are never deleted.
pub async fn reconcile(
    blobs: &BlobStore,
    owner_id: &str,
    desired_urls: Vec<String>,
    new_files: Vec<ImageUpload>,
    previous_urls: &[String],
) -> PostResult<Vec<String>> {
    let to_delete = images_to_delete(previous_urls, &desired_urls);

    tracing::debug!(
        "Reconciling images: keeping {}, deleting {}, uploading {}",
        desired_urls.len(),
        to_delete.len(),
        new_files.len()
    );

    let deletes = try_join_all(to_delete.iter().map(|url| blobs.delete(url, owner_id)));
    let uploads = try_join_all(new_files.into_iter().map(|file| blobs.put(file, owner_id)));
    let (_, uploaded) = futures::try_join!(deletes, uploads)?;

    let mut images = desired_urls;
    images.extend(uploaded);
    Ok(images)
}
