use bson::{Bson, Document, doc};
use docservice::query::{PSEUDO_FIELDS, Select, build_projection, compile_query, with_id_field};
use docservice::{IdPolicy, MemoryStore, Model, Params, Service, ServiceConfig, ServiceOptions};
use proptest::prelude::*;

fn field_name() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

proptest! {
    #[test]
    fn prop_compiled_filter_never_holds_pseudo_fields(
        fields in proptest::collection::btree_map(field_name(), any::<i32>(), 0..6),
        limit in 0u32..100,
        skip in 0u32..100,
    ) {
        let mut query = Document::new();
        for (k, v) in &fields {
            query.insert(k.clone(), *v);
        }
        query.insert("$limit", i64::from(limit));
        query.insert("$skip", i64::from(skip));
        query.insert("$sort", doc! {"a": 1});
        query.insert("$select", vec!["a"]);

        let compiled = compile_query(&IdPolicy::default(), None, &query).unwrap();
        for pseudo in PSEUDO_FIELDS {
            prop_assert!(!compiled.filter.contains_key(pseudo));
        }
        prop_assert_eq!(compiled.filter.len(), fields.len());
        prop_assert_eq!(compiled.options.limit, Some(u64::from(limit)));
        prop_assert_eq!(compiled.options.skip, Some(u64::from(skip)));
    }

    #[test]
    fn prop_list_projection_includes_every_field_and_id(
        fields in proptest::collection::vec(field_name(), 0..8),
    ) {
        let projection = with_id_field(build_projection(&Select::Fields(fields.clone())), "_id");
        for f in &fields {
            prop_assert_eq!(projection.get(f), Some(&Bson::Int32(1)));
        }
        prop_assert_eq!(projection.get("_id"), Some(&Bson::Int32(1)));
    }

    #[test]
    fn prop_patch_returns_exactly_the_pre_update_matches(
        flags in proptest::collection::vec(any::<bool>(), 1..20),
    ) {
        let docs: Vec<Document> = flags
            .iter()
            .enumerate()
            .map(|(i, f)| doc! {"_id": i64::try_from(i).unwrap(), "active": *f})
            .collect();
        let expected: Vec<i64> = docs
            .iter()
            .filter(|d| d.get_bool("active").unwrap())
            .map(|d| d.get_i64("_id").unwrap())
            .collect();

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let patched = runtime.block_on(async {
            let store = MemoryStore::with_documents("drift", docs).unwrap();
            let service = Service::new(ServiceOptions::new(Model::ready(store), ServiceConfig::default())).unwrap();
            service
                .patch(None, doc! {"active": false}, &Params::with_query(doc! {"active": true}))
                .await
                .unwrap()
                .into_vec()
        });

        let mut ids: Vec<i64> = patched.iter().map(|d| d.get_i64("_id").unwrap()).collect();
        ids.sort_unstable();
        prop_assert_eq!(ids, expected);
        prop_assert!(patched.iter().all(|d| !d.get_bool("active").unwrap()));
    }
}
