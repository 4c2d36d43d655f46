//! Address insertion and query tests.

mod common;

use chrono::{Duration, Utc};
use common::{new_addr_book, rand_addr, rand_pub_key};
use taro_address::{AddrError, PubKey, QueryParams, Storage};
use tarodb::{AddrBook, Error, InternalKey, NewAddr, NewGenesisAsset, NewScriptKey, TxOptions};

#[tokio::test]
async fn inserted_addrs_round_trip() {
    let db = new_addr_book().await;

    let mut addrs: Vec<_> = (0..5).map(|_| rand_addr()).collect();
    // Legacy placeholder for a missing family key.
    addrs[3].taro.family_key = Some(PubKey::Empty);

    db.book.insert_addrs(&addrs).await.unwrap();

    let stored = db.book.query_addrs(&QueryParams::default()).await.unwrap();
    assert_eq!(stored, addrs);

    for addr in &addrs {
        let stored = db
            .book
            .addr_by_taproot_output(&addr.taproot_output_key)
            .await
            .unwrap();
        assert_eq!(&stored, addr);
    }
}

#[tokio::test]
async fn shared_keys_are_stored_once() {
    let db = new_addr_book().await;

    // Same asset and internal key for both addresses.
    let first = rand_addr();
    let mut second = rand_addr();
    second.taro.genesis = first.taro.genesis.clone();
    second.taro.internal_key = first.taro.internal_key;
    second.internal_key_desc = first.internal_key_desc;

    db.book
        .insert_addrs(&[first.clone(), second.clone()])
        .await
        .unwrap();

    let stored = db.book.query_addrs(&QueryParams::default()).await.unwrap();
    assert_eq!(stored, vec![first, second]);
}

#[tokio::test]
async fn duplicate_taproot_output_key_is_rejected() {
    let db = new_addr_book().await;

    let addr = rand_addr();
    db.book.insert_addrs(&[addr.clone()]).await.unwrap();

    let mut duplicate = rand_addr();
    duplicate.taproot_output_key = addr.taproot_output_key;

    let err = db
        .book
        .insert_addrs(&[rand_addr(), duplicate])
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation(), "{err}");
    assert!(err.to_string().contains("constraint"));

    // Nothing from the failed batch is persisted.
    let stored = db.book.query_addrs(&QueryParams::default()).await.unwrap();
    assert_eq!(stored, vec![addr]);
}

#[tokio::test]
async fn oversized_amount_is_rejected() {
    let db = new_addr_book().await;

    let valid = rand_addr();
    let mut oversized = rand_addr();
    oversized.taro.amount = u64::MAX;

    let err = db
        .book
        .insert_addrs(&[valid, oversized])
        .await
        .unwrap_err();
    assert!(
        matches!(
            err.root(),
            Error::Addr(AddrError::AmountOutOfRange(u64::MAX))
        ),
        "{err}"
    );

    let stored = db.book.query_addrs(&QueryParams::default()).await.unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn unknown_addr_is_reported() {
    let db = new_addr_book().await;
    db.book.insert_addrs(&[rand_addr()]).await.unwrap();

    let unknown = rand_addr();
    let err = db
        .book
        .addr_by_taproot_output(&unknown.taproot_output_key)
        .await
        .unwrap_err();
    assert!(err.is_no_addr());

    let err = db
        .book
        .set_addr_managed(&unknown, Utc::now())
        .await
        .unwrap_err();
    assert!(err.is_no_addr());
}

#[tokio::test]
async fn query_filters() {
    let db = new_addr_book().await;

    let addrs: Vec<_> = (0..5).map(|_| rand_addr()).collect();
    db.book.insert_addrs(&addrs).await.unwrap();

    struct Case {
        name: &'static str,
        params: QueryParams,
        expected: Vec<usize>,
    }

    let now = Utc::now();
    let cases = [
        Case {
            name: "no params",
            params: QueryParams::default(),
            expected: vec![0, 1, 2, 3, 4],
        },
        Case {
            name: "limit and offset",
            params: QueryParams {
                limit: Some(2),
                offset: 1,
                ..Default::default()
            },
            expected: vec![1, 2],
        },
        Case {
            name: "zero limit",
            params: QueryParams {
                limit: Some(0),
                offset: 3,
                ..Default::default()
            },
            expected: vec![3, 4],
        },
        Case {
            name: "created after the future",
            params: QueryParams {
                created_after: Some(now + Duration::days(1)),
                ..Default::default()
            },
            expected: vec![],
        },
        Case {
            name: "created before the past",
            params: QueryParams {
                created_before: Some(now - Duration::days(1)),
                ..Default::default()
            },
            expected: vec![],
        },
        Case {
            name: "created within the last day",
            params: QueryParams {
                created_after: Some(now - Duration::days(1)),
                created_before: Some(now + Duration::days(1)),
                ..Default::default()
            },
            expected: vec![0, 1, 2, 3, 4],
        },
    ];

    for case in cases {
        let stored = db.book.query_addrs(&case.params).await.unwrap();
        let expected: Vec<_> = case.expected.iter().map(|&i| addrs[i].clone()).collect();
        assert_eq!(stored, expected, "{}", case.name);
    }
}

#[tokio::test]
async fn managed_addrs_are_filtered() {
    let db = new_addr_book().await;

    let mut addrs: Vec<_> = (0..5).map(|_| rand_addr()).collect();
    db.book.insert_addrs(&addrs).await.unwrap();

    let managed_from = addrs[0].creation_time + Duration::minutes(10);
    for i in [0, 2] {
        db.book
            .set_addr_managed(&addrs[i], managed_from)
            .await
            .unwrap();
        addrs[i].managed_from = Some(managed_from);
    }

    let unmanaged = db
        .book
        .query_addrs(&QueryParams {
            unmanaged_only: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(
        unmanaged,
        vec![addrs[1].clone(), addrs[3].clone(), addrs[4].clone()]
    );

    let all = db.book.query_addrs(&QueryParams::default()).await.unwrap();
    assert_eq!(all, addrs);
    assert!(all[0].is_managed());
    assert!(!all[1].is_managed());

    let managed = db
        .book
        .addr_by_taproot_output(&addrs[2].taproot_output_key)
        .await
        .unwrap();
    assert_eq!(managed.managed_from, Some(managed_from));
}

#[tokio::test]
async fn corrupted_key_aborts_query() {
    let db = new_addr_book().await;
    db.book.insert_addrs(&[rand_addr()]).await.unwrap();

    // 33 bytes, but not a point on the curve.
    let mut bad_key = vec![0x02];
    bad_key.extend_from_slice(&[0xff; 32]);
    let script_key = rand_pub_key().serialize().to_vec();
    let taproot_output_key = rand_pub_key().x_only_public_key().0.serialize().to_vec();

    db.raw
        .exec_tx(TxOptions::write(), move |db| {
            Box::pin(async move {
                let genesis_point_id = db.upsert_genesis_point(&[1u8; 36]).await?;
                let genesis_asset_id = db
                    .upsert_genesis_asset(&NewGenesisAsset {
                        asset_id: vec![2u8; 32],
                        asset_tag: "corrupted".into(),
                        meta_data: vec![],
                        output_index: 0,
                        asset_type: 0,
                        genesis_point_id,
                    })
                    .await?;
                let key_id = db
                    .upsert_internal_key(&InternalKey {
                        raw_key: bad_key,
                        key_family: 0,
                        key_index: 0,
                    })
                    .await?;
                let script_key_id = db
                    .upsert_script_key(&NewScriptKey {
                        internal_key_id: key_id,
                        tweaked_script_key: script_key,
                        tweak: vec![],
                    })
                    .await?;
                db.insert_addr(&NewAddr {
                    version: 0,
                    genesis_asset_id,
                    fam_key: None,
                    script_key_id,
                    taproot_key_id: key_id,
                    taproot_output_key,
                    amount: 1,
                    asset_type: 0,
                    creation_time: Utc::now().timestamp(),
                })
                .await?;
                Ok(())
            })
        })
        .await
        .unwrap();

    let err = db
        .book
        .query_addrs(&QueryParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::Decode { .. }), "{err}");
}
