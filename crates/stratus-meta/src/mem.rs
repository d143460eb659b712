//! In-memory reference implementation of [`MetaClient`].
//!
//! Tables are sorted `BTreeMap`s behind a single `RwLock`, so a committed
//! transaction is one atomic mutation of the table state. Key layouts mirror
//! the relational schema: objects are keyed `(bucket, name, version)` and
//! part rows `(bucket, object, part_version, part_number)`, which gives the
//! same iteration order as `order by bucketname, name, version`.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::Bound::{Excluded, Included, Unbounded};

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::client::{
    MetaClient, Mutation, ObjectListing, Transaction, UploadListing, VersionedListing,
};
use crate::error::{MetaError, MetaResult};
use crate::types::{
    Bucket, Freezer, Multipart, Object, ObjectType, Part, VersioningStatus, NULL_VERSION_ID,
    NULL_VERSION_WIRE,
};

/// Cursor suffix that sorts after every extension of a common prefix.
///
/// The greatest code point plays the role the `0xFF` byte suffix plays in a
/// raw-byte key space: `prefix + MAX_KEY_SUFFIX` is greater than every real
/// key underneath `prefix`, so setting the cursor to it skips the remainder
/// of the prefix in one step.
const MAX_KEY_SUFFIX: char = '\u{10FFFF}';

type ObjectKey = (String, String, u64);
type PartKey = (String, String, u64, u32);
type UploadKey = (String, String, String);

#[derive(Default)]
struct Tables {
    buckets: BTreeMap<String, Bucket>,
    users: BTreeSet<(String, String)>,
    objects: BTreeMap<ObjectKey, Object>,
    parts: BTreeMap<PartKey, Part>,
    multiparts: BTreeMap<UploadKey, Multipart>,
    freezers: BTreeMap<(String, String, u64), Freezer>,
    lifecycle: BTreeMap<String, serde_json::Value>,
}

impl Tables {
    fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::PutBucket(bucket) => {
                self.buckets.insert(bucket.name.clone(), bucket);
            }
            Mutation::DeleteBucket { name } => {
                self.buckets.remove(&name);
            }
            Mutation::AddUsage { bucket, delta } => {
                if let Some(b) = self.buckets.get_mut(&bucket) {
                    b.usage += delta;
                }
            }
            Mutation::PutObject(object) => {
                let key = (
                    object.bucket_name.clone(),
                    object.name.clone(),
                    object.version_id,
                );
                self.objects.insert(key, object);
            }
            Mutation::DeleteObject {
                bucket,
                name,
                version,
            } => {
                self.objects.remove(&(bucket, name, version));
            }
            Mutation::PutPart {
                bucket,
                object,
                part_version,
                part,
            } => {
                self.parts
                    .insert((bucket, object, part_version, part.part_number), part);
            }
            Mutation::DeleteParts {
                bucket,
                object,
                part_version,
            } => {
                let lo = (bucket.clone(), object.clone(), part_version, 0u32);
                let hi = (bucket, object, part_version, u32::MAX);
                let keys: Vec<PartKey> = self
                    .parts
                    .range((Included(lo), Included(hi)))
                    .map(|(k, _)| k.clone())
                    .collect();
                for k in keys {
                    self.parts.remove(&k);
                }
            }
            Mutation::PutMultipart(multipart) => {
                let key = (
                    multipart.bucket_name.clone(),
                    multipart.object_name.clone(),
                    multipart.upload_id.clone(),
                );
                self.multiparts.insert(key, multipart);
            }
            Mutation::PutMultipartPart {
                bucket,
                object,
                upload_id,
                part,
            } => {
                if let Some(mp) = self.multiparts.get_mut(&(bucket, object, upload_id)) {
                    mp.parts.insert(part.part_number, part);
                }
            }
            Mutation::DeleteMultipart {
                bucket,
                object,
                upload_id,
            } => {
                self.multiparts.remove(&(bucket, object, upload_id));
            }
            Mutation::PutUserBucket { user_id, bucket } => {
                self.users.insert((user_id, bucket));
            }
            Mutation::DeleteUserBucket { user_id, bucket } => {
                self.users.remove(&(user_id, bucket));
            }
            Mutation::DeleteLifecycle { bucket } => {
                self.lifecycle.remove(&bucket);
            }
            Mutation::DeleteFreezer {
                bucket,
                name,
                version,
            } => {
                self.freezers.remove(&(bucket, name, version));
            }
        }
    }

    /// Materialize part rows onto a multipart object.
    fn load_parts(&self, mut object: Object) -> Object {
        if object.object_type == ObjectType::Multipart {
            let pv = object.part_version();
            let lo = (object.bucket_name.clone(), object.name.clone(), pv, 0u32);
            let hi = (
                object.bucket_name.clone(),
                object.name.clone(),
                pv,
                u32::MAX,
            );
            object.parts = self
                .parts
                .range((Included(lo), Included(hi)))
                .map(|(k, p)| (k.3, p.clone()))
                .collect();
        }
        object
    }

    /// All rows of one key, sorted by effective version id ascending, so the
    /// null version interleaves by its creation time.
    fn name_rows(&self, bucket: &str, name: &str) -> Vec<Object> {
        let lo = (bucket.to_owned(), name.to_owned(), NULL_VERSION_ID);
        let hi = (bucket.to_owned(), name.to_owned(), u64::MAX);
        let mut rows: Vec<Object> = self
            .objects
            .range((Included(lo), Included(hi)))
            .map(|(_, o)| o.clone())
            .collect();
        rows.sort_by_key(Object::effective_version_id);
        rows
    }
}

/// In-memory [`MetaClient`].
pub struct MemMetaClient {
    tables: RwLock<Tables>,
}

impl std::fmt::Debug for MemMetaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.tables.read();
        f.debug_struct("MemMetaClient")
            .field("buckets", &t.buckets.len())
            .field("objects", &t.objects.len())
            .field("multiparts", &t.multiparts.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemMetaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemMetaClient {
    /// Create an empty client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    fn stage_put_object(
        tx: &mut Transaction,
        object: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
    ) {
        if !object.parts.is_empty() {
            let pv = object.part_version();
            for part in object.parts.values() {
                tx.push(Mutation::PutPart {
                    bucket: object.bucket_name.clone(),
                    object: object.name.clone(),
                    part_version: pv,
                    part: part.clone(),
                });
            }
        }
        let mut row = object.clone();
        row.parts = BTreeMap::new();
        tx.push(Mutation::PutObject(row));
        if let Some(mp) = multipart {
            tx.push(Mutation::DeleteMultipart {
                bucket: mp.bucket_name.clone(),
                object: mp.object_name.clone(),
                upload_id: mp.upload_id.clone(),
            });
        }
        if update_usage {
            tx.push(Mutation::AddUsage {
                bucket: object.bucket_name.clone(),
                delta: object.size as i64,
            });
        }
    }
}

#[async_trait]
impl MetaClient for MemMetaClient {
    // -- buckets --

    async fn get_bucket(&self, name: &str) -> MetaResult<Bucket> {
        let t = self.tables.read();
        t.buckets
            .get(name)
            .cloned()
            .ok_or_else(|| MetaError::NoSuchBucket {
                bucket: name.to_owned(),
            })
    }

    async fn list_buckets(&self) -> MetaResult<Vec<Bucket>> {
        Ok(self.tables.read().buckets.values().cloned().collect())
    }

    async fn list_user_buckets(&self, user_id: &str) -> MetaResult<Vec<String>> {
        let t = self.tables.read();
        let lo = (user_id.to_owned(), String::new());
        Ok(t.users
            .range((Included(lo), Unbounded))
            .take_while(|(u, _)| u == user_id)
            .map(|(_, b)| b.clone())
            .collect())
    }

    async fn put_new_bucket(&self, bucket: Bucket) -> MetaResult<()> {
        let mut t = self.tables.write();
        if t.buckets.contains_key(&bucket.name) {
            return Err(MetaError::fatal(
                "put new bucket",
                anyhow!("duplicate bucket row: {}", bucket.name),
            ));
        }
        t.users.insert((bucket.owner_id.clone(), bucket.name.clone()));
        t.buckets.insert(bucket.name.clone(), bucket);
        Ok(())
    }

    async fn check_and_put_bucket(&self, bucket: Bucket) -> MetaResult<bool> {
        let mut t = self.tables.write();
        if t.buckets.contains_key(&bucket.name) {
            return Ok(false);
        }
        debug!(bucket = %bucket.name, "creating bucket row");
        t.users.insert((bucket.owner_id.clone(), bucket.name.clone()));
        t.buckets.insert(bucket.name.clone(), bucket);
        Ok(true)
    }

    async fn put_bucket(&self, bucket: Bucket) -> MetaResult<()> {
        let mut t = self.tables.write();
        t.buckets.insert(bucket.name.clone(), bucket);
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &Bucket) -> MetaResult<()> {
        let mut t = self.tables.write();
        t.buckets.remove(&bucket.name);
        t.users
            .remove(&(bucket.owner_id.clone(), bucket.name.clone()));
        t.lifecycle.remove(&bucket.name);
        Ok(())
    }

    async fn update_usage(
        &self,
        bucket: &str,
        delta: i64,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<()> {
        match tx {
            Some(tx) => {
                tx.push(Mutation::AddUsage {
                    bucket: bucket.to_owned(),
                    delta,
                });
                Ok(())
            }
            None => {
                let mut t = self.tables.write();
                t.apply(Mutation::AddUsage {
                    bucket: bucket.to_owned(),
                    delta,
                });
                Ok(())
            }
        }
    }

    // -- objects --

    async fn get_object(&self, bucket: &str, name: &str, version: u64) -> MetaResult<Object> {
        let t = self.tables.read();
        let obj = t
            .objects
            .get(&(bucket.to_owned(), name.to_owned(), version))
            .cloned()
            .ok_or_else(|| MetaError::NoSuchKey {
                key: name.to_owned(),
            })?;
        Ok(t.load_parts(obj))
    }

    async fn get_latest_object_version(&self, bucket: &str, name: &str) -> MetaResult<Object> {
        let t = self.tables.read();
        let null_obj = t
            .objects
            .get(&(bucket.to_owned(), name.to_owned(), NULL_VERSION_ID))
            .cloned();
        let lo = (bucket.to_owned(), name.to_owned(), NULL_VERSION_ID);
        let hi = (bucket.to_owned(), name.to_owned(), u64::MAX);
        let versioned = t
            .objects
            .range((Excluded(lo), Included(hi)))
            .next()
            .map(|(_, o)| o.clone());

        let picked = match (null_obj, versioned) {
            (None, None) => {
                return Err(MetaError::NoSuchKey {
                    key: name.to_owned(),
                })
            }
            (Some(n), None) => n,
            (None, Some(v)) => v,
            // The larger last-modified wins; a tie goes to the versioned row.
            (Some(n), Some(v)) => {
                if n.last_modified > v.last_modified {
                    n
                } else {
                    v
                }
            }
        };
        Ok(t.load_parts(picked))
    }

    async fn put_object(
        &self,
        object: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
    ) -> MetaResult<()> {
        let mut tx = Transaction::new();
        Self::stage_put_object(&mut tx, object, multipart, update_usage);
        self.commit(tx).await
    }

    async fn update_object(
        &self,
        object: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<()> {
        match tx {
            Some(tx) => {
                Self::stage_put_object(tx, object, multipart, update_usage);
                Ok(())
            }
            None => self.put_object(object, multipart, update_usage).await,
        }
    }

    async fn delete_object(&self, object: &Object, tx: Option<&mut Transaction>) -> MetaResult<()> {
        let stage = |tx: &mut Transaction| {
            tx.push(Mutation::DeleteObject {
                bucket: object.bucket_name.clone(),
                name: object.name.clone(),
                version: object.version_id,
            });
            tx.push(Mutation::DeleteParts {
                bucket: object.bucket_name.clone(),
                object: object.name.clone(),
                part_version: object.part_version(),
            });
        };
        match tx {
            Some(tx) => {
                stage(tx);
                Ok(())
            }
            None => {
                let mut own = Transaction::new();
                stage(&mut own);
                self.commit(own).await
            }
        }
    }

    async fn delete_object_parts(
        &self,
        object: &Object,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<()> {
        let mutation = Mutation::DeleteParts {
            bucket: object.bucket_name.clone(),
            object: object.name.clone(),
            part_version: object.part_version(),
        };
        match tx {
            Some(tx) => {
                tx.push(mutation);
                Ok(())
            }
            None => {
                self.tables.write().apply(mutation);
                Ok(())
            }
        }
    }

    async fn list_objects(
        &self,
        bucket: &str,
        marker: &str,
        prefix: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> MetaResult<ObjectListing> {
        let t = self.tables.read();
        let mut listing = ObjectListing::default();
        let mut seen_prefixes: HashSet<String> = HashSet::new();
        let mut count = 0usize;
        let mut cursor = marker.to_owned();

        'outer: loop {
            let start = (bucket.to_owned(), cursor.clone(), u64::MAX);
            let mut jumped = false;
            for ((b, name, _version), obj) in t.objects.range((Excluded(start), Unbounded)) {
                if b != bucket {
                    break 'outer;
                }
                if !name.starts_with(prefix) {
                    if name.as_str() > prefix {
                        break 'outer;
                    }
                    continue;
                }
                if obj.delete_marker {
                    continue;
                }
                if !delimiter.is_empty() {
                    let sub = &name[prefix.len()..];
                    if let Some(pos) = sub.find(delimiter) {
                        let prefix_key = format!("{prefix}{}{delimiter}", &sub[..pos]);
                        if seen_prefixes.insert(prefix_key.clone()) {
                            count += 1;
                            if count > max_keys {
                                listing.is_truncated = true;
                                break 'outer;
                            }
                            if count == max_keys {
                                listing.next_marker = Some(prefix_key.clone());
                            }
                            listing.common_prefixes.push(prefix_key.clone());
                        }
                        // Skip the remaining siblings of this prefix.
                        cursor = format!("{prefix_key}{MAX_KEY_SUFFIX}");
                        jumped = true;
                        break;
                    }
                }
                count += 1;
                if count > max_keys {
                    listing.is_truncated = true;
                    break 'outer;
                }
                if count == max_keys {
                    listing.next_marker = Some(name.clone());
                }
                listing.objects.push(obj.clone());
            }
            if !jumped {
                break;
            }
        }
        Ok(listing)
    }

    async fn list_latest_objects(
        &self,
        bucket: &str,
        marker: &str,
        prefix: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> MetaResult<ObjectListing> {
        let t = self.tables.read();
        let mut listing = ObjectListing::default();
        let mut seen_prefixes: HashSet<String> = HashSet::new();
        let mut count = 0usize;
        let mut cursor = marker.to_owned();

        'outer: loop {
            let start = (bucket.to_owned(), cursor.clone(), u64::MAX);
            let mut jumped = false;
            for ((b, name, version), obj) in t.objects.range((Excluded(start), Unbounded)) {
                if b != bucket {
                    break 'outer;
                }
                if !name.starts_with(prefix) {
                    if name.as_str() > prefix {
                        break 'outer;
                    }
                    continue;
                }
                if !delimiter.is_empty() {
                    let sub = &name[prefix.len()..];
                    if let Some(pos) = sub.find(delimiter) {
                        let prefix_key = format!("{prefix}{}{delimiter}", &sub[..pos]);
                        if seen_prefixes.insert(prefix_key.clone()) {
                            count += 1;
                            if count > max_keys {
                                listing.is_truncated = true;
                                break 'outer;
                            }
                            if count == max_keys {
                                listing.next_marker = Some(prefix_key.clone());
                            }
                            listing.common_prefixes.push(prefix_key.clone());
                        }
                        cursor = format!("{prefix_key}{MAX_KEY_SUFFIX}");
                        jumped = true;
                        break;
                    }
                }

                // First row of the key group. A null row sorts first; compare
                // it against the newest versioned row by creation time.
                let candidate = if *version == NULL_VERSION_ID {
                    let lo = (bucket.to_owned(), name.clone(), NULL_VERSION_ID);
                    let hi = (bucket.to_owned(), name.clone(), u64::MAX);
                    match t.objects.range((Excluded(lo), Included(hi))).next() {
                        Some((_, versioned)) if versioned.create_time > obj.create_time => {
                            versioned
                        }
                        _ => obj,
                    }
                } else {
                    obj
                };

                cursor = name.clone();
                jumped = true;
                if candidate.delete_marker {
                    break;
                }
                count += 1;
                if count > max_keys {
                    listing.is_truncated = true;
                    break 'outer;
                }
                if count == max_keys {
                    listing.next_marker = Some(name.clone());
                }
                listing.objects.push(candidate.clone());
                break;
            }
            if !jumped {
                break;
            }
        }
        Ok(listing)
    }

    async fn list_versioned_objects(
        &self,
        bucket: &str,
        key_marker: &str,
        version_id_marker: &str,
        prefix: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> MetaResult<VersionedListing> {
        let t = self.tables.read();
        let mut listing = VersionedListing::default();
        let mut seen_prefixes: HashSet<String> = HashSet::new();
        let mut count = 0usize;

        let emit = |listing: &mut VersionedListing, count: &mut usize, obj: &Object| -> bool {
            *count += 1;
            if *count > max_keys {
                listing.is_truncated = true;
                return true;
            }
            if *count == max_keys {
                listing.next_key_marker = Some(obj.name.clone());
                listing.next_version_id_marker = Some(obj.wire_version_id());
            }
            listing.objects.push(obj.clone());
            false
        };

        let is_prefix_marker =
            !delimiter.is_empty() && !key_marker.is_empty() && key_marker.ends_with(delimiter);

        let mut cursor = if is_prefix_marker {
            // A marker sitting on a common-prefix boundary resumes after the
            // whole prefix.
            format!("{key_marker}{MAX_KEY_SUFFIX}")
        } else if key_marker.is_empty() {
            String::new()
        } else {
            // Resume inside the marker key: emit its remaining versions.
            let rows = t.name_rows(bucket, key_marker);
            let marker_eff: u64 = if version_id_marker.is_empty() {
                // Key marker alone: list the marker key from its first version.
                0
            } else if version_id_marker == NULL_VERSION_WIRE {
                match rows.iter().find(|o| o.is_null_version()) {
                    Some(null_obj) => null_obj.derived_version_id(),
                    None => return Ok(listing),
                }
            } else {
                version_id_marker.parse().map_err(|e| {
                    MetaError::warn(
                        "parse version-id marker",
                        anyhow!("{version_id_marker}: {e}"),
                    )
                })?
            };
            for obj in rows.iter().filter(|o| o.effective_version_id() > marker_eff) {
                if emit(&mut listing, &mut count, obj) {
                    return Ok(listing);
                }
            }
            key_marker.to_owned()
        };

        'outer: loop {
            let start = (bucket.to_owned(), cursor.clone(), u64::MAX);
            let mut jumped = false;
            for ((b, name, _version), obj) in t.objects.range((Excluded(start), Unbounded)) {
                if b != bucket {
                    break 'outer;
                }
                if !name.starts_with(prefix) {
                    if name.as_str() > prefix {
                        break 'outer;
                    }
                    continue;
                }
                if !delimiter.is_empty() {
                    let sub = &name[prefix.len()..];
                    if let Some(pos) = sub.find(delimiter) {
                        let prefix_key = format!("{prefix}{}{delimiter}", &sub[..pos]);
                        if seen_prefixes.insert(prefix_key.clone()) {
                            count += 1;
                            if count > max_keys {
                                listing.is_truncated = true;
                                break 'outer;
                            }
                            if count == max_keys {
                                listing.next_key_marker = Some(prefix_key.clone());
                                listing.next_version_id_marker = Some(obj.wire_version_id());
                            }
                            listing.common_prefixes.push(prefix_key.clone());
                        }
                        cursor = format!("{prefix_key}{MAX_KEY_SUFFIX}");
                        jumped = true;
                        break;
                    }
                }

                // Emit every version of this key, null interleaved by its
                // creation time.
                for row in t.name_rows(bucket, name) {
                    if emit(&mut listing, &mut count, &row) {
                        break 'outer;
                    }
                }
                cursor = name.clone();
                jumped = true;
                break;
            }
            if !jumped {
                break;
            }
        }
        Ok(listing)
    }

    async fn is_empty_bucket(&self, bucket: &Bucket) -> MetaResult<bool> {
        let listing_empty = if bucket.versioning == VersioningStatus::Disabled {
            let l = self.list_objects(&bucket.name, "", "", "", 1).await?;
            l.objects.is_empty() && l.common_prefixes.is_empty()
        } else {
            let l = self
                .list_versioned_objects(&bucket.name, "", "", "", "", 1)
                .await?;
            l.objects.is_empty() && l.common_prefixes.is_empty()
        };
        if !listing_empty {
            return Ok(false);
        }
        let uploads = self
            .list_multipart_uploads(&bucket.name, "", "", "", "", 1)
            .await?;
        Ok(uploads.uploads.is_empty())
    }

    // -- multipart --

    async fn create_multipart(&self, multipart: Multipart) -> MetaResult<()> {
        let mut t = self.tables.write();
        t.apply(Mutation::PutMultipart(multipart));
        Ok(())
    }

    async fn get_multipart(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
    ) -> MetaResult<Multipart> {
        let t = self.tables.read();
        t.multiparts
            .get(&(bucket.to_owned(), object.to_owned(), upload_id.to_owned()))
            .cloned()
            .ok_or_else(|| MetaError::NoSuchUpload {
                upload_id: upload_id.to_owned(),
            })
    }

    async fn put_object_part(&self, multipart: &Multipart, part: Part) -> MetaResult<i64> {
        let mut t = self.tables.write();
        let key = (
            multipart.bucket_name.clone(),
            multipart.object_name.clone(),
            multipart.upload_id.clone(),
        );
        let row = t
            .multiparts
            .get_mut(&key)
            .ok_or_else(|| MetaError::NoSuchUpload {
                upload_id: multipart.upload_id.clone(),
            })?;
        let new_size = part.size as i64;
        let old = row.parts.insert(part.part_number, part);
        Ok(new_size - old.map_or(0, |p| p.size as i64))
    }

    async fn delete_multipart(
        &self,
        multipart: &Multipart,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<i64> {
        let key = (
            multipart.bucket_name.clone(),
            multipart.object_name.clone(),
            multipart.upload_id.clone(),
        );
        let removed_size = {
            let t = self.tables.read();
            t.multiparts.get(&key).map_or(0, |mp| mp.total_size() as i64)
        };
        let mutation = Mutation::DeleteMultipart {
            bucket: key.0,
            object: key.1,
            upload_id: key.2,
        };
        match tx {
            Some(tx) => tx.push(mutation),
            None => self.tables.write().apply(mutation),
        }
        Ok(removed_size)
    }

    async fn list_multipart_uploads(
        &self,
        bucket: &str,
        key_marker: &str,
        upload_id_marker: &str,
        prefix: &str,
        delimiter: &str,
        max_uploads: usize,
    ) -> MetaResult<UploadListing> {
        let t = self.tables.read();
        let mut listing = UploadListing::default();
        let mut seen_prefixes: HashSet<String> = HashSet::new();
        let mut count = 0usize;

        let lo = (bucket.to_owned(), String::new(), String::new());
        for ((b, name, upload_id), mp) in t.multiparts.range((Included(lo), Unbounded)) {
            if b != bucket {
                break;
            }
            if !key_marker.is_empty() {
                let past_marker = if upload_id_marker.is_empty() {
                    name.as_str() > key_marker
                } else {
                    name.as_str() > key_marker
                        || (name == key_marker && upload_id.as_str() > upload_id_marker)
                };
                if !past_marker {
                    continue;
                }
            }
            if !name.starts_with(prefix) {
                if name.as_str() > prefix {
                    break;
                }
                continue;
            }
            if !delimiter.is_empty() {
                let sub = &name[prefix.len()..];
                if let Some(pos) = sub.find(delimiter) {
                    let prefix_key = format!("{prefix}{}{delimiter}", &sub[..pos]);
                    if seen_prefixes.insert(prefix_key.clone()) {
                        count += 1;
                        if count > max_uploads {
                            listing.is_truncated = true;
                            break;
                        }
                        listing.common_prefixes.push(prefix_key);
                    }
                    continue;
                }
            }
            count += 1;
            if count > max_uploads {
                listing.is_truncated = true;
                break;
            }
            if count == max_uploads {
                listing.next_key_marker = Some(name.clone());
                listing.next_upload_id_marker = Some(upload_id.clone());
            }
            listing.uploads.push(mp.clone());
        }
        Ok(listing)
    }

    // -- freezer --

    async fn get_freezer(&self, bucket: &str, name: &str, version: u64) -> MetaResult<Freezer> {
        let t = self.tables.read();
        t.freezers
            .get(&(bucket.to_owned(), name.to_owned(), version))
            .cloned()
            .ok_or_else(|| MetaError::NoSuchKey {
                key: name.to_owned(),
            })
    }

    async fn delete_freezer(&self, freezer: &Freezer) -> MetaResult<()> {
        let mut t = self.tables.write();
        t.apply(Mutation::DeleteFreezer {
            bucket: freezer.bucket_name.clone(),
            name: freezer.name.clone(),
            version: freezer.version_id,
        });
        Ok(())
    }

    // -- transactions --

    async fn commit(&self, tx: Transaction) -> MetaResult<()> {
        let mut t = self.tables.write();
        for mutation in tx.into_mutations() {
            t.apply(mutation);
        }
        Ok(())
    }
}

impl MemMetaClient {
    /// Insert a freezer row. Test and restore-daemon surface; the engine only
    /// reads and deletes them.
    pub fn put_freezer(&self, freezer: Freezer) {
        let mut t = self.tables.write();
        t.freezers.insert(
            (
                freezer.bucket_name.clone(),
                freezer.name.clone(),
                freezer.version_id,
            ),
            freezer,
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
