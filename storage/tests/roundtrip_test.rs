use spacemap_core::{
    ClassificationRule, Dimensionality, NoiseParameters, QuadrantCache, QuadrantSettings,
};
use spacemap_storage::QuadrantStore;
use tokio::runtime::Builder;

fn cache() -> QuadrantCache {
    let params = NoiseParameters::new(6.0, 2, 0.5, 2.0, 4242).unwrap();
    QuadrantCache::new(
        &params,
        QuadrantSettings {
            dims: Dimensionality::Three,
            edge_length: 6,
            rule: ClassificationRule::default(),
            falloff: None,
        },
    )
    .unwrap()
}

#[test]
#[ignore = "needs a MongoDB server on localhost:27017"]
fn test_roundtrip_quadrant() {
    // Build a single-threaded Tokio runtime
    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build Tokio runtime");

    rt.block_on(async {
        let source = cache();
        let quadrant = source.ensure([1, -1, 0]).read().clone();

        // Initialize storage (MongoDB must be running)
        let store = QuadrantStore::init("mongodb://localhost:27017", "spacemap_test", "quadrants")
            .await
            .expect("storage init failed");
        store.delete_seed(4242).await.expect("cleanup failed");

        store.save(4242, [1, -1, 0], &quadrant).await.expect("save failed");
        // saving twice replaces the snapshot
        store.save(4242, [1, -1, 0], &quadrant).await.expect("resave failed");
        assert_eq!(store.list_keys(4242).await.unwrap(), vec![[1, -1, 0]]);

        let found = store
            .load(4242, [1, -1, 0])
            .await
            .expect("load failed")
            .expect("quadrant not found");
        assert_eq!(found, quadrant);

        // a fresh cache adopts the snapshot instead of generating
        let target = cache();
        assert!(store.restore_into(&target, [1, -1, 0]).await.unwrap());
        assert_eq!(target.generation_count(), 0);
        assert!(!store.restore_into(&target, [9, 9, 9]).await.unwrap());

        store.delete(4242, [1, -1, 0]).await.expect("delete failed");
        assert!(store.load(4242, [1, -1, 0]).await.unwrap().is_none());
    });
}
