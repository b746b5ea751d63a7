mod common;

use std::time::Duration;

use emporium_core::{CatalogItemPatch, IdentityPatch, NewCatalogItem, Registration};
use emporium_server::CacheTtls;

fn ada() -> Registration {
    Registration {
        username: "ada".into(),
        email: "ada@example.com".into(),
        password: "analytical".into(),
    }
}

fn guitar() -> NewCatalogItem {
    NewCatalogItem {
        name: "Stratocaster".into(),
        description: "Electric guitar".into(),
        price: 1299.0,
    }
}

#[tokio::test]
async fn second_read_is_served_from_cache() {
    let h = common::identity();
    let user_id = h.service.register(ada()).await.unwrap().user_id;

    let first = h.service.get(&user_id).await.unwrap();
    let reads = h.store.read_count();
    let second = h.service.get(&user_id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.store.read_count(), reads);
}

#[tokio::test]
async fn update_is_visible_on_next_read() {
    let h = common::identity();
    let user_id = h.service.register(ada()).await.unwrap().user_id;
    assert_eq!(h.service.get(&user_id).await.unwrap().username, "ada");

    h.service
        .update(
            &user_id,
            IdentityPatch {
                username: Some("lovelace".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(h.service.get(&user_id).await.unwrap().username, "lovelace");
    let listed = h.service.list().await.unwrap();
    assert_eq!(listed[0].username, "lovelace");
}

#[tokio::test]
async fn registration_invalidates_the_user_list() {
    let h = common::identity();
    assert!(h.service.list().await.unwrap().is_empty());

    h.service.register(ada()).await.unwrap();
    assert_eq!(h.service.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn expired_entry_is_reloaded_once() {
    let h = common::identity_with_ttls(CacheTtls {
        entity: Duration::from_millis(100),
        ..CacheTtls::default()
    });
    let user_id = h.service.register(ada()).await.unwrap().user_id;

    h.service.get(&user_id).await.unwrap();
    let reads = h.store.read_count();

    tokio::time::sleep(Duration::from_millis(150)).await;
    h.service.get(&user_id).await.unwrap();
    h.service.get(&user_id).await.unwrap();

    assert_eq!(h.store.read_count(), reads + 1);
}

#[tokio::test]
async fn deleted_entity_is_not_served_from_cache() {
    let h = common::catalog();
    let item = h.service.create(guitar()).await.unwrap();
    h.service.get(&item.id).await.unwrap();

    h.service.delete(&item.id).await.unwrap();

    let err = h.service.get(&item.id).await.unwrap_err();
    assert_eq!(err.category(), "not_found");
    assert!(h.service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_loads_are_not_cached() {
    let h = common::catalog();
    assert!(h.service.get("missing").await.is_err());
    let reads = h.store.read_count();
    assert!(h.service.get("missing").await.is_err());
    assert_eq!(h.store.read_count(), reads + 1);
}

#[tokio::test]
async fn flush_drops_every_entry_of_the_kind() {
    let h = common::catalog();
    let item = h.service.create(guitar()).await.unwrap();
    h.service.get(&item.id).await.unwrap();
    h.service.list().await.unwrap();

    assert_eq!(h.service.flush_cache().await.unwrap(), 2);

    let reads = h.store.read_count();
    h.service.get(&item.id).await.unwrap();
    assert_eq!(h.store.read_count(), reads + 1);
    assert_eq!(h.service.flush_cache().await.unwrap(), 1);
}

#[tokio::test]
async fn catalog_update_refreshes_cached_item() {
    let h = common::catalog();
    let item = h.service.create(guitar()).await.unwrap();
    h.service.get(&item.id).await.unwrap();

    h.service
        .update(
            &item.id,
            CatalogItemPatch {
                price: Some(999.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(h.service.get(&item.id).await.unwrap().price, 999.0);

    let topics = h.events.wait_for(2).await;
    let topics: Vec<_> = topics.iter().map(|e| e.topic.as_str()).collect();
    assert!(topics.contains(&"instrument_created"));
    assert!(topics.contains(&"instrument_updated"));
}

#[tokio::test]
async fn basket_reads_are_cached_and_invalidated_on_change() {
    let h = common::basket();

    let empty = h.service.get("u1").await.unwrap();
    assert!(empty.items.is_empty());
    assert_eq!(h.store.read_count(), 1);
    h.service.get("u1").await.unwrap();
    assert_eq!(h.store.read_count(), 1);

    h.service
        .add_item(
            "u1",
            emporium_core::BasketItem {
                catalog_item_id: "sax".into(),
                quantity: 2,
            },
        )
        .await
        .unwrap();

    let basket = h.service.get("u1").await.unwrap();
    assert_eq!(basket.items.len(), 1);
    assert_eq!(basket.items[0].quantity, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_basket_adds_are_all_kept() {
    let h = common::basket();

    let handles: Vec<_> = (0..200)
        .map(|i| {
            let service = std::sync::Arc::clone(&h.service);
            tokio::spawn(async move {
                let item = emporium_core::BasketItem {
                    catalog_item_id: format!("instrument-{i}"),
                    quantity: 1,
                };
                service.add_item("u1", item).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.service.get("u1").await.unwrap().items.len(), 200);
}
