//! File-backed storage engine
//!
//! The whole object graph lives in one in-memory map keyed `"Kind.id"`;
//! `save` serializes every entity into a single JSON object and swaps it in
//! via temp-file-then-rename, so a crash mid-write never leaves a torn store.
//!
//! The map itself performs no cross-request locking: concurrent mutating
//! units of work race unless the caller serializes them. Accepted
//! limitation of the flat-file backend; run it single-writer.

use std::collections::BTreeMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use lodge_types::{Entity, EntityKind, ParentLink};

use crate::engine::{LinkOutcome, StorageEngine};
use crate::error::{Result, StoreError};

pub struct FileStore {
    path: PathBuf,
    objects: DashMap<String, Entity>,
}

fn storage_key(kind: EntityKind, id: &str) -> String {
    format!("{kind}.{id}")
}

impl FileStore {
    /// Create an engine over `path`. The store is empty until `reload`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            objects: DashMap::new(),
        }
    }

    fn get_entity(&self, kind: EntityKind, id: &str) -> Option<Entity> {
        self.objects
            .get(&storage_key(kind, id))
            .map(|e| e.value().clone())
    }

    fn require_place(&self, place_id: &str) -> Result<lodge_types::Place> {
        match self.get_entity(EntityKind::Place, place_id) {
            Some(Entity::Place(place)) => Ok(place),
            _ => Err(StoreError::not_found(EntityKind::Place, place_id)),
        }
    }

    /// Ids of `kind` records whose `link` key equals `parent_id`.
    fn child_ids(&self, kind: EntityKind, link: ParentLink, parent_id: &str) -> Vec<String> {
        self.objects
            .iter()
            .filter(|entry| {
                entry.value().kind() == kind && entry.value().parent_id(link) == Some(parent_id)
            })
            .map(|entry| entry.value().id().to_string())
            .collect()
    }

    /// Remove one record plus everything it owns, following the same edges
    /// the relational schema cascades over.
    fn remove_cascading(&self, kind: EntityKind, id: &str) {
        let mut worklist = vec![(kind, id.to_string())];
        while let Some((kind, id)) = worklist.pop() {
            self.objects.remove(&storage_key(kind, &id));
            match kind {
                EntityKind::State => {
                    for city in self.child_ids(EntityKind::City, ParentLink::StateId, &id) {
                        worklist.push((EntityKind::City, city));
                    }
                }
                EntityKind::City => {
                    for place in self.child_ids(EntityKind::Place, ParentLink::CityId, &id) {
                        worklist.push((EntityKind::Place, place));
                    }
                }
                EntityKind::User => {
                    for place in self.child_ids(EntityKind::Place, ParentLink::UserId, &id) {
                        worklist.push((EntityKind::Place, place));
                    }
                    for review in self.child_ids(EntityKind::Review, ParentLink::UserId, &id) {
                        worklist.push((EntityKind::Review, review));
                    }
                }
                EntityKind::Place => {
                    for review in self.child_ids(EntityKind::Review, ParentLink::PlaceId, &id) {
                        worklist.push((EntityKind::Review, review));
                    }
                }
                EntityKind::Amenity => self.unlink_everywhere(&id),
                EntityKind::Review => {}
            }
        }
    }

    /// Drop a deleted amenity's id from every place's link list.
    fn unlink_everywhere(&self, amenity_id: &str) {
        let linked: Vec<String> = self
            .objects
            .iter()
            .filter_map(|entry| match entry.value() {
                Entity::Place(p) if p.amenity_ids.iter().any(|a| a == amenity_id) => {
                    Some(entry.key().clone())
                }
                _ => None,
            })
            .collect();
        for key in linked {
            if let Some(mut entry) = self.objects.get_mut(&key) {
                if let Entity::Place(place) = entry.value_mut() {
                    place.amenity_ids.retain(|a| a != amenity_id);
                }
            }
        }
    }

    async fn read_store(&self) -> Result<()> {
        self.objects.clear();
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            return Ok(());
        }
        let graph: BTreeMap<String, Entity> = serde_json::from_slice(&bytes)?;
        for (_, entity) in graph {
            self.objects.insert(entity.storage_key(), entity);
        }
        Ok(())
    }
}

#[async_trait]
impl StorageEngine for FileStore {
    async fn all(&self, kind: Option<EntityKind>) -> Result<BTreeMap<String, Entity>> {
        Ok(self
            .objects
            .iter()
            .filter(|entry| kind.map_or(true, |k| entry.value().kind() == k))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>> {
        Ok(self.get_entity(kind, id))
    }

    async fn count(&self, kind: Option<EntityKind>) -> Result<u64> {
        Ok(self
            .objects
            .iter()
            .filter(|entry| kind.map_or(true, |k| entry.value().kind() == k))
            .count() as u64)
    }

    async fn children(
        &self,
        kind: EntityKind,
        link: ParentLink,
        parent_id: &str,
    ) -> Result<Vec<Entity>> {
        let mut children: Vec<Entity> = self
            .objects
            .iter()
            .filter(|entry| {
                entry.value().kind() == kind && entry.value().parent_id(link) == Some(parent_id)
            })
            .map(|entry| entry.value().clone())
            .collect();
        children.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(children)
    }

    async fn amenities_of(&self, place_id: &str) -> Result<Vec<Entity>> {
        let place = self.require_place(place_id)?;
        Ok(place
            .amenity_ids
            .iter()
            .filter_map(|id| self.get_entity(EntityKind::Amenity, id))
            .collect())
    }

    async fn link_amenity(&self, place_id: &str, amenity_id: &str) -> Result<LinkOutcome> {
        let place = self.require_place(place_id)?;
        if self.get_entity(EntityKind::Amenity, amenity_id).is_none() {
            return Err(StoreError::not_found(EntityKind::Amenity, amenity_id));
        }
        if place.amenity_ids.iter().any(|a| a == amenity_id) {
            return Ok(LinkOutcome::Existing);
        }
        if let Some(mut entry) = self.objects.get_mut(&storage_key(EntityKind::Place, place_id)) {
            if let Entity::Place(place) = entry.value_mut() {
                place.amenity_ids.push(amenity_id.to_string());
            }
        }
        Ok(LinkOutcome::Created)
    }

    async fn unlink_amenity(&self, place_id: &str, amenity_id: &str) -> Result<()> {
        let place = self.require_place(place_id)?;
        if !place.amenity_ids.iter().any(|a| a == amenity_id) {
            return Err(StoreError::not_found(EntityKind::Amenity, amenity_id));
        }
        if let Some(mut entry) = self.objects.get_mut(&storage_key(EntityKind::Place, place_id)) {
            if let Entity::Place(place) = entry.value_mut() {
                place.amenity_ids.retain(|a| a != amenity_id);
            }
        }
        Ok(())
    }

    async fn stage(&self, entity: Entity) -> Result<()> {
        self.objects.insert(entity.storage_key(), entity);
        Ok(())
    }

    async fn delete(&self, entity: Option<&Entity>) -> Result<()> {
        if let Some(entity) = entity {
            self.remove_cascading(entity.kind(), entity.id());
        }
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let graph: BTreeMap<String, Entity> = self
            .objects
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let bytes = serde_json::to_vec(&graph)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(entities = graph.len(), path = %self.path.display(), "flushed file store");
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.read_store().await?;
        tracing::info!(
            entities = self.objects.len(),
            path = %self.path.display(),
            "file store loaded"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Re-reading the backing file is the file-mode analogue of rolling
        // back an uncommitted transaction: unsaved changes are dropped.
        self.read_store().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodge_types::{Amenity, City, Place, Review, State, User};

    fn store(dir: &tempfile::TempDir) -> FileStore {
        FileStore::new(dir.path().join("lodge.json"))
    }

    #[tokio::test]
    async fn reload_tolerates_an_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = store(&dir);
        engine.reload().await.unwrap();
        assert_eq!(engine.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn save_then_reload_round_trips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let engine = store(&dir);
        engine.reload().await.unwrap();

        let user = User::new("owner@example.com", "secret123");
        let entity = Entity::from(user);
        engine.stage(entity.clone()).await.unwrap();
        engine.save().await.unwrap();

        let reopened = store(&dir);
        reopened.reload().await.unwrap();
        let loaded = reopened
            .get(EntityKind::User, entity.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, entity);
    }

    #[tokio::test]
    async fn get_after_save_and_get_absent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = store(&dir);
        engine.reload().await.unwrap();

        let state = Entity::from(State::new("California"));
        let id = state.id().to_string();
        engine.stage(state.clone()).await.unwrap();
        engine.save().await.unwrap();

        assert_eq!(engine.get(EntityKind::State, &id).await.unwrap(), Some(state));
        assert_eq!(
            engine.get(EntityKind::State, "no-such-id").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn count_matches_all() {
        let dir = tempfile::tempdir().unwrap();
        let engine = store(&dir);
        engine.reload().await.unwrap();

        for name in ["wifi", "pool", "parking"] {
            engine.stage(Entity::from(Amenity::new(name))).await.unwrap();
        }
        engine.stage(Entity::from(State::new("Texas"))).await.unwrap();
        engine.save().await.unwrap();

        let amenities = engine.all(Some(EntityKind::Amenity)).await.unwrap();
        assert_eq!(
            engine.count(Some(EntityKind::Amenity)).await.unwrap(),
            amenities.len() as u64
        );
        assert_eq!(engine.count(None).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn deleting_a_state_cascades_to_cities_places_and_reviews() {
        let dir = tempfile::tempdir().unwrap();
        let engine = store(&dir);
        engine.reload().await.unwrap();

        let state = State::new("California");
        let city = City::new("San Francisco", &state.id);
        let owner = User::new("host@example.com", "pw");
        let place = Place::new("Painted Lady", &city.id, &owner.id);
        let review = Review::new("lovely", &place.id, &owner.id);

        let state_id = state.id.clone();
        let city_id = city.id.clone();
        let place_id = place.id.clone();
        let review_id = review.id.clone();

        engine.stage(Entity::from(state.clone())).await.unwrap();
        engine.stage(Entity::from(city)).await.unwrap();
        engine.stage(Entity::from(owner)).await.unwrap();
        engine.stage(Entity::from(place)).await.unwrap();
        engine.stage(Entity::from(review)).await.unwrap();
        engine.save().await.unwrap();

        engine
            .delete(Some(&Entity::from(state)))
            .await
            .unwrap();
        engine.save().await.unwrap();

        let cities = engine.all(Some(EntityKind::City)).await.unwrap();
        assert!(cities
            .values()
            .all(|c| c.parent_id(ParentLink::StateId) != Some(state_id.as_str())));
        assert!(engine.get(EntityKind::City, &city_id).await.unwrap().is_none());
        assert!(engine.get(EntityKind::Place, &place_id).await.unwrap().is_none());
        assert!(engine
            .get(EntityKind::Review, &review_id)
            .await
            .unwrap()
            .is_none());
        // The owner is not owned by the state and survives.
        assert_eq!(engine.count(Some(EntityKind::User)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn children_come_back_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let engine = store(&dir);
        engine.reload().await.unwrap();

        let state = State::new("Oregon");
        let state_id = state.id.clone();
        engine.stage(Entity::from(state)).await.unwrap();

        let mut expected = Vec::new();
        for name in ["Portland", "Salem", "Eugene"] {
            let city = City::new(name, &state_id);
            expected.push(city.id.clone());
            engine.stage(Entity::from(city)).await.unwrap();
        }
        engine.save().await.unwrap();

        let children = engine
            .children(EntityKind::City, ParentLink::StateId, &state_id)
            .await
            .unwrap();
        let got: Vec<&str> = children.iter().map(|c| c.id()).collect();
        assert_eq!(got, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn linking_is_idempotent_and_unlinking_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let engine = store(&dir);
        engine.reload().await.unwrap();

        let owner = User::new("host@example.com", "pw");
        let state = State::new("Nevada");
        let city = City::new("Reno", &state.id);
        let place = Place::new("Cabin", &city.id, &owner.id);
        let wifi = Amenity::new("wifi");
        let pool = Amenity::new("pool");

        let place_id = place.id.clone();
        let wifi_id = wifi.id.clone();
        let pool_id = pool.id.clone();

        for entity in [
            Entity::from(owner),
            Entity::from(state),
            Entity::from(city),
            Entity::from(place),
            Entity::from(wifi),
            Entity::from(pool),
        ] {
            engine.stage(entity).await.unwrap();
        }
        engine.save().await.unwrap();

        assert_eq!(
            engine.link_amenity(&place_id, &wifi_id).await.unwrap(),
            LinkOutcome::Created
        );
        assert_eq!(
            engine.link_amenity(&place_id, &wifi_id).await.unwrap(),
            LinkOutcome::Existing
        );
        let linked = engine.amenities_of(&place_id).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id(), wifi_id);

        let err = engine.unlink_amenity(&place_id, &pool_id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        engine.unlink_amenity(&place_id, &wifi_id).await.unwrap();
        assert!(engine.amenities_of(&place_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_an_amenity_removes_its_links() {
        let dir = tempfile::tempdir().unwrap();
        let engine = store(&dir);
        engine.reload().await.unwrap();

        let owner = User::new("host@example.com", "pw");
        let state = State::new("Nevada");
        let city = City::new("Reno", &state.id);
        let place = Place::new("Cabin", &city.id, &owner.id);
        let wifi = Amenity::new("wifi");

        let place_id = place.id.clone();
        let wifi_entity = Entity::from(wifi);

        for entity in [
            Entity::from(owner),
            Entity::from(state),
            Entity::from(city),
            Entity::from(place),
            wifi_entity.clone(),
        ] {
            engine.stage(entity).await.unwrap();
        }
        engine.link_amenity(&place_id, wifi_entity.id()).await.unwrap();
        engine.save().await.unwrap();

        engine.delete(Some(&wifi_entity)).await.unwrap();
        engine.save().await.unwrap();

        assert!(engine.amenities_of(&place_id).await.unwrap().is_empty());
        match engine.get(EntityKind::Place, &place_id).await.unwrap() {
            Some(Entity::Place(p)) => assert!(p.amenity_ids.is_empty()),
            other => panic!("expected place, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_drops_unsaved_changes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = store(&dir);
        engine.reload().await.unwrap();

        let saved = Entity::from(State::new("Saved"));
        engine.stage(saved.clone()).await.unwrap();
        engine.save().await.unwrap();

        let staged = Entity::from(State::new("Staged only"));
        let staged_id = staged.id().to_string();
        engine.stage(staged).await.unwrap();
        engine.close().await.unwrap();

        assert!(engine
            .get(EntityKind::State, &staged_id)
            .await
            .unwrap()
            .is_none());
        assert!(engine
            .get(EntityKind::State, saved.id())
            .await
            .unwrap()
            .is_some());
    }
}
