use crate::{
    codec,
    db::{DynStore, Edit},
    entities::RouteState,
    error::Error,
};

pub const KEY_POINT_A: &str = "point_a";
pub const KEY_POINT_B: &str = "point_b";
pub const KEY_ROUTE_POINTS: &str = "route_points";

/// Saves and restores the route triple through a key-value store.
///
/// Missing values are stored as missing keys. Stored values that no longer
/// decode are reported as missing, and a path is only restored together with
/// both of its endpoints.
#[derive(Clone)]
pub struct PersistenceStore {
    store: DynStore,
}

impl PersistenceStore {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip_all)]
    pub async fn save(&self, route: &RouteState) -> Result<(), Error> {
        let edits = vec![
            match &route.origin {
                Some(point) => Edit::Put(KEY_POINT_A.into(), codec::encode(point)),
                None => Edit::Remove(KEY_POINT_A.into()),
            },
            match &route.destination {
                Some(point) => Edit::Put(KEY_POINT_B.into(), codec::encode(point)),
                None => Edit::Remove(KEY_POINT_B.into()),
            },
            match &route.path {
                Some(points) => Edit::Put(KEY_ROUTE_POINTS.into(), codec::encode_list(points)),
                None => Edit::Remove(KEY_ROUTE_POINTS.into()),
            },
        ];

        self.store.apply(edits).await
    }

    #[tracing::instrument(skip_all)]
    pub async fn load(&self) -> Result<RouteState, Error> {
        let origin = self.store.get(KEY_POINT_A).await?;
        let destination = self.store.get(KEY_POINT_B).await?;
        let path = self.store.get(KEY_ROUTE_POINTS).await?;

        let origin = origin.as_deref().and_then(codec::decode);
        let destination = destination.as_deref().and_then(codec::decode);
        let path = match (origin, destination) {
            (Some(_), Some(_)) => codec::decode_list(path.as_deref()),
            _ => None,
        };

        Ok(RouteState::new(origin, destination, path))
    }

    #[tracing::instrument(skip_all)]
    pub async fn clear(&self) -> Result<(), Error> {
        self.store.clear().await
    }
}

#[cfg(test)]
fn memory_persistence() -> (std::sync::Arc<crate::db::MemoryStore>, PersistenceStore) {
    let memory = std::sync::Arc::new(crate::db::MemoryStore::new());
    let persistence = PersistenceStore::new(memory.clone());
    (memory, persistence)
}

#[test]
fn absent_values_stay_absent() {
    use tokio_test::block_on;

    let (memory, persistence) = memory_persistence();

    block_on(persistence.save(&RouteState::default())).unwrap();
    assert_eq!(block_on(memory.len()), 0);
    assert_eq!(block_on(persistence.load()).unwrap(), RouteState::default());
}

#[test]
fn saved_triple_is_loaded_back() {
    use crate::entities::GeoPoint;
    use crate::db::KeyValueStore;
    use tokio_test::block_on;

    let (memory, persistence) = memory_persistence();
    let a = GeoPoint::new_unchecked(40.0, -3.0);
    let b = GeoPoint::new_unchecked(40.01, -3.01);
    let route = RouteState::new(Some(a), Some(b), Some(vec![a, b]));

    block_on(persistence.save(&route)).unwrap();
    assert_eq!(
        block_on(memory.get(KEY_ROUTE_POINTS)).unwrap().as_deref(),
        Some("40,-3|40.01,-3.01")
    );
    assert_eq!(block_on(persistence.load()).unwrap(), route);

    block_on(persistence.save(&RouteState::new(Some(a), None, None))).unwrap();
    assert_eq!(block_on(memory.get(KEY_POINT_B)).unwrap(), None);
    assert_eq!(block_on(memory.get(KEY_ROUTE_POINTS)).unwrap(), None);
}

#[test]
fn malformed_stored_values_load_as_missing() {
    use crate::entities::GeoPoint;
    use crate::db::KeyValueStore;
    use tokio_test::block_on;

    let (memory, persistence) = memory_persistence();
    block_on(memory.apply(vec![
        Edit::Put(KEY_POINT_A.into(), "garbage".into()),
        Edit::Put(KEY_POINT_B.into(), "1,2".into()),
        Edit::Put(KEY_ROUTE_POINTS.into(), "1,2|bad|3,4".into()),
    ]))
    .unwrap();

    let route = block_on(persistence.load()).unwrap();
    assert_eq!(route.origin, None);
    assert_eq!(route.destination, Some(GeoPoint::new_unchecked(1.0, 2.0)));
    assert_eq!(route.path, None);

    block_on(memory.apply(vec![Edit::Put(KEY_POINT_A.into(), "0.5,0.5".into())])).unwrap();
    assert_eq!(
        block_on(persistence.load()).unwrap().path,
        Some(vec![
            GeoPoint::new_unchecked(1.0, 2.0),
            GeoPoint::new_unchecked(3.0, 4.0)
        ])
    );

    block_on(persistence.clear()).unwrap();
    assert_eq!(block_on(persistence.load()).unwrap(), RouteState::default());
}

#[test]
fn path_without_a_destination_is_not_restored() {
    use crate::db::KeyValueStore;
    use crate::entities::GeoPoint;
    use tokio_test::block_on;

    let (memory, persistence) = memory_persistence();
    block_on(memory.apply(vec![
        Edit::Put(KEY_POINT_A.into(), "40,-3".into()),
        Edit::Put(KEY_POINT_B.into(), "garbage".into()),
        Edit::Put(KEY_ROUTE_POINTS.into(), "40,-3|40.01,-3.01".into()),
    ]))
    .unwrap();

    let route = block_on(persistence.load()).unwrap();
    assert_eq!(
        route,
        RouteState::new(Some(GeoPoint::new_unchecked(40.0, -3.0)), None, None)
    );
}
