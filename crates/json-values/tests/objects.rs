mod common;

use std::rc::Rc;

use common::fixtures::load_fixture;
use common::models::{EmptyObject, Gist, GistFile, Owner, Repository, SubObject};
use json_values::{downcast, Class, Members, Model, ModelType, ObjectRef, Store, ValuesError};
use serde_json::{json, Value};

fn repository(store: &Store) -> Rc<Repository> {
    store
        .build_object_as::<Repository>(load_fixture("repository"))
        .unwrap()
}

#[test]
fn test_materialized_child_shares_the_parent_region() {
    let store = Store::new();
    let repo = repository(&store);
    let owner = store
        .get_object_as::<Owner>(repo.as_ref(), "owner")
        .unwrap()
        .unwrap();

    assert!(owner.values().is_bound());
    assert_eq!(store.get_value(owner.as_ref(), "login").unwrap(), json!("symfony"));

    store.set_value(owner.as_ref(), "login", "fabpot").unwrap();
    assert_eq!(store.get_value(repo.as_ref(), "owner.login").unwrap(), json!("fabpot"));

    store.set_value(repo.as_ref(), "owner.id", 1).unwrap();
    assert_eq!(store.get_value(owner.as_ref(), "id").unwrap(), json!(1));

    store.add_value(owner.as_ref(), "emails", "a@example.com", None).unwrap();
    assert_eq!(
        store.get_value(repo.as_ref(), "owner.emails").unwrap(),
        json!(["a@example.com"])
    );
}

#[test]
fn test_materialization_is_cached() {
    let store = Store::new();
    let repo = repository(&store);

    let first = store.get_object_as::<Owner>(repo.as_ref(), "owner").unwrap().unwrap();
    let second = store.get_object_as::<Owner>(repo.as_ref(), "owner").unwrap().unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(repo.values().cached_paths(), vec![vec!["owner".to_string()]]);
}

#[test]
fn test_missing_and_scalar_regions() {
    let store = Store::new();
    let repo = repository(&store);

    assert!(store
        .get_object(repo.as_ref(), "license", Class::of::<Owner>())
        .unwrap()
        .is_none());
    let err = store
        .get_object(repo.as_ref(), "name", Class::of::<Owner>())
        .unwrap_err();
    assert!(matches!(
        err,
        ValuesError::TypeConflict { found: "string", .. }
    ));
}

#[test]
fn test_overwriting_the_region_detaches_the_child() {
    let store = Store::new();
    let repo = repository(&store);
    let old = store.get_object_as::<Owner>(repo.as_ref(), "owner").unwrap().unwrap();

    store
        .set_value(repo.as_ref(), "owner", json!({"id": 2, "login": "nicolas"}))
        .unwrap();

    assert!(!old.values().is_bound());
    assert_eq!(store.get_value(old.as_ref(), "login").unwrap(), json!("symfony"));

    let new = store.get_object_as::<Owner>(repo.as_ref(), "owner").unwrap().unwrap();
    assert!(!Rc::ptr_eq(&old, &new));
    assert_eq!(store.get_value(new.as_ref(), "login").unwrap(), json!("nicolas"));

    store.set_value(old.as_ref(), "login", "detached").unwrap();
    assert_eq!(store.get_value(repo.as_ref(), "owner.login").unwrap(), json!("nicolas"));
}

#[test]
fn test_writes_below_a_child_keep_it_cached() {
    let store = Store::new();
    let repo = repository(&store);
    let owner = store.get_object_as::<Owner>(repo.as_ref(), "owner").unwrap().unwrap();

    store.set_value(repo.as_ref(), "owner.login", "other").unwrap();
    store.set_value(repo.as_ref(), "name", "renamed").unwrap();

    let again = store.get_object_as::<Owner>(repo.as_ref(), "owner").unwrap().unwrap();
    assert!(Rc::ptr_eq(&owner, &again));
    assert_eq!(store.get_value(owner.as_ref(), "login").unwrap(), json!("other"));
}

#[test]
fn test_set_values_clears_the_cache() {
    let store = Store::new();
    let repo = repository(&store);
    let owner = store.get_object_as::<Owner>(repo.as_ref(), "owner").unwrap().unwrap();

    store
        .set_values(repo.as_ref(), json!({"owner": {"login": "replaced"}}))
        .unwrap();
    assert!(repo.values().cached_paths().is_empty());
    assert!(!owner.values().is_bound());
    assert_eq!(store.get_value(owner.as_ref(), "login").unwrap(), json!("symfony"));

    let fresh = store.get_object_as::<Owner>(repo.as_ref(), "owner").unwrap().unwrap();
    assert_eq!(store.get_value(fresh.as_ref(), "login").unwrap(), json!("replaced"));
}

#[test]
fn test_removing_a_list_member_invalidates_its_siblings() {
    let store = Store::new();
    let parent = EmptyObject::default();
    store
        .set_values(&parent, json!({"items": [{"n": 0}, {"n": 1}, {"n": 2}]}))
        .unwrap();
    let second = store.get_object_as::<EmptyObject>(&parent, "items.1").unwrap().unwrap();

    store.set_value(&parent, "items.0", Value::Null).unwrap();

    assert!(!second.values().is_bound());
    assert_eq!(store.get_value(second.as_ref(), "n").unwrap(), json!(1));
    let shifted = store.get_object_as::<EmptyObject>(&parent, "items.1").unwrap().unwrap();
    assert_eq!(store.get_value(shifted.as_ref(), "n").unwrap(), json!(2));
}

#[test]
fn test_defaults_fill_missing_keys() {
    let store = Store::new();
    let parent = EmptyObject::default();
    store.set_values(&parent, json!({"sub": {"kind": "custom"}})).unwrap();

    let sub = store.get_object_as::<SubObject>(&parent, "sub").unwrap().unwrap();
    assert_eq!(
        store.get_values(sub.as_ref()),
        json!({"kind": "custom", "enabled": true})
    );
    assert_eq!(
        store.get_values(&parent),
        json!({"sub": {"kind": "custom", "enabled": true}})
    );
}

#[test]
fn test_unresolved_class_is_a_configuration_error() {
    let store = Store::new();
    let repo = repository(&store);

    let err = store.get_object(repo.as_ref(), "owner", Class::Auto).unwrap_err();
    assert!(matches!(err, ValuesError::Configuration { ref path } if path == "owner"));

    let err = store
        .get_object(repo.as_ref(), "owner", Class::named("Owner"))
        .unwrap_err();
    assert!(matches!(err, ValuesError::Configuration { .. }));

    store.register_type::<Owner>();
    let owner = store
        .get_object(repo.as_ref(), "owner", Class::named("Owner"))
        .unwrap()
        .unwrap();
    assert_eq!(owner.values().type_name(), "Owner");
}

#[test]
fn test_factory_class_reads_the_raw_document() {
    let store = Store::new();
    let parent = EmptyObject::default();
    store
        .set_values(&parent, json!({"a": {"type": "User"}, "b": {"type": "Organization"}}))
        .unwrap();
    let class = Class::factory(|raw| match raw["type"].as_str() {
        Some("User") => Some(ModelType::of::<Owner>()),
        _ => Some(ModelType::of::<EmptyObject>()),
    });

    let a = store.get_object(&parent, "a", class.clone()).unwrap().unwrap();
    let b = store.get_object(&parent, "b", class).unwrap().unwrap();
    assert_eq!(a.values().type_name(), "Owner");
    assert_eq!(b.values().type_name(), "EmptyObject");
}

#[test]
fn test_cached_object_of_another_type_is_unexpected() {
    let store = Store::new();
    let repo = repository(&store);
    store
        .get_object(repo.as_ref(), "owner", Class::of::<EmptyObject>())
        .unwrap();

    let err = store.get_object_as::<Owner>(repo.as_ref(), "owner").unwrap_err();
    assert!(matches!(
        err,
        ValuesError::UnexpectedType {
            expected: "Owner",
            found: "EmptyObject",
            ..
        }
    ));
}

#[test]
fn test_set_object_copies_then_binds() {
    let store = Store::new();
    let repo = Repository::default();
    let owner = store
        .build_object_as::<Owner>(json!({"id": 143937, "login": "symfony"}))
        .unwrap();

    store
        .set_object(&repo, "owner", Some(owner.clone() as ObjectRef))
        .unwrap();
    assert_eq!(
        store.get_values(&repo),
        json!({"owner": {"id": 143937, "login": "symfony"}})
    );
    assert!(owner.values().is_bound());

    store.set_value(owner.as_ref(), "login", "fabpot").unwrap();
    assert_eq!(store.get_value(&repo, "owner.login").unwrap(), json!("fabpot"));

    let cached = store.get_object_as::<Owner>(&repo, "owner").unwrap().unwrap();
    assert!(Rc::ptr_eq(&owner, &cached));
}

#[test]
fn test_set_object_none_removes_and_detaches() {
    let store = Store::new();
    let repo = repository(&store);
    let owner = store.get_object_as::<Owner>(repo.as_ref(), "owner").unwrap().unwrap();

    store.set_object(repo.as_ref(), "owner", None).unwrap();
    assert_eq!(store.get_value(repo.as_ref(), "owner").unwrap(), Value::Null);
    assert!(repo.values().cached_paths().is_empty());
    assert_eq!(store.get_value(owner.as_ref(), "login").unwrap(), json!("symfony"));
}

#[test]
fn test_replacing_an_attached_object() {
    let store = Store::new();
    let repo = Repository::default();
    let first = store.build_object_as::<Owner>(json!({"login": "first"})).unwrap();
    let second = store.build_object_as::<Owner>(json!({"login": "second"})).unwrap();

    store.set_object(&repo, "owner", Some(first.clone() as ObjectRef)).unwrap();
    store.set_object(&repo, "owner", Some(second.clone() as ObjectRef)).unwrap();

    assert!(!first.values().is_bound());
    store.set_value(first.as_ref(), "login", "changed").unwrap();
    assert_eq!(store.get_value(&repo, "owner.login").unwrap(), json!("second"));
}

#[test]
fn test_set_objects_list_and_keyed() {
    let store = Store::new();
    let gist = Gist::default();
    let a = store.build_object_as::<GistFile>(json!({"size": 5})).unwrap();
    let b = store.build_object_as::<GistFile>(json!({"size": 7})).unwrap();

    store
        .set_objects(
            &gist,
            "files",
            Some(Members::keyed([
                ("a.txt", a.clone() as ObjectRef),
                ("b.txt", b.clone() as ObjectRef),
            ])),
        )
        .unwrap();
    assert_eq!(
        store.get_value(&gist, "files").unwrap(),
        json!({"a.txt": {"size": 5}, "b.txt": {"size": 7}})
    );
    store.set_value(b.as_ref(), "size", 8).unwrap();
    assert_eq!(store.get_value(&gist, ["files", "b.txt", "size"]).unwrap(), json!(8));

    store
        .set_objects(&gist, "history", Some(Members::list([a.clone() as ObjectRef])))
        .unwrap();
    assert_eq!(store.get_value(&gist, "history").unwrap(), json!([{"size": 5}]));

    store.set_objects(&gist, "empty", Some(Members::list([]))).unwrap();
    assert_eq!(store.get_value(&gist, "empty").unwrap(), json!([]));

    store.set_objects(&gist, "history", None).unwrap();
    assert_eq!(store.get_value(&gist, "history").unwrap(), Value::Null);
}

#[test]
fn test_add_object_accumulates() {
    let store = Store::new();
    let repo = Repository::default();

    for login in ["a", "b", "c"] {
        let owner = store.build_object(Class::of::<Owner>(), json!({"login": login})).unwrap();
        store.add_object(&repo, "contributors", owner, None).unwrap();
    }
    let keyed = store.build_object(Class::of::<Owner>(), json!({"login": "d"})).unwrap();
    assert_eq!(
        store.add_object(&repo, "maintainers", keyed.clone(), Some("d.e")).unwrap(),
        "d.e"
    );

    assert_eq!(
        store.get_value(&repo, "contributors").unwrap(),
        json!([{"login": "a"}, {"login": "b"}, {"login": "c"}])
    );
    let cached = store
        .get_object(&repo, ["maintainers", "d.e"], Class::Auto)
        .unwrap()
        .unwrap();
    assert!(Rc::ptr_eq(&cached, &keyed));
}

#[test]
fn test_add_object_to_scalar_is_a_type_conflict() {
    let store = Store::new();
    let repo = repository(&store);
    let owner = store.build_object(Class::of::<Owner>(), json!({})).unwrap();
    assert!(matches!(
        store.add_object(repo.as_ref(), "name", owner, None),
        Err(ValuesError::TypeConflict { .. })
    ));
}

#[test]
fn test_get_objects_keyed_by_dotted_names() {
    let store = Store::new();
    let gist = store.build_object_as::<Gist>(load_fixture("gist")).unwrap();

    let files: Vec<(String, Rc<GistFile>)> = store
        .get_objects_as::<GistFile>(gist.as_ref(), "files")
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let names: Vec<&str> = files.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert_eq!(store.get_value(files[1].1.as_ref(), "size").unwrap(), json!(7));

    store.set_value(files[0].1.as_ref(), "size", 6).unwrap();
    assert_eq!(
        store.get_value(gist.as_ref(), ["files", "a.txt", "size"]).unwrap(),
        json!(6)
    );

    let again = store
        .get_object_as::<GistFile>(gist.as_ref(), ["files", "a.txt"])
        .unwrap()
        .unwrap();
    assert!(Rc::ptr_eq(&again, &files[0].1));
}

#[test]
fn test_get_objects_visits_each_member_once() {
    let store = Store::new();
    let parent = EmptyObject::default();
    store
        .set_values(&parent, json!({"items": [{"n": 0}, {"n": 1}]}))
        .unwrap();

    let mut visited = Vec::new();
    for member in store.get_objects(&parent, "items", Class::of::<EmptyObject>()).unwrap() {
        let (key, object) = member.unwrap();
        visited.push(key);
        let extra = store.build_object(Class::of::<EmptyObject>(), json!({"n": 9})).unwrap();
        store.add_object(&parent, "items", extra, None).unwrap();
        assert!(object.values().is_bound());
    }

    assert_eq!(visited, vec!["0", "1"]);
    assert_eq!(
        store.get_value(&parent, "items").unwrap().as_array().map(Vec::len),
        Some(4)
    );
}

#[test]
fn test_get_objects_edge_cases() {
    let store = Store::new();
    let parent = EmptyObject::default();
    store
        .set_values(&parent, json!({"scalar": 1, "holes": {"a": {"n": 1}, "b": null}}))
        .unwrap();

    assert_eq!(
        store
            .get_objects(&parent, "missing", Class::of::<EmptyObject>())
            .unwrap()
            .count(),
        0
    );
    assert!(matches!(
        store.get_objects(&parent, "scalar", Class::of::<EmptyObject>()),
        Err(ValuesError::TypeConflict { .. })
    ));

    let members: Vec<_> = store
        .get_objects(&parent, "holes", Class::of::<EmptyObject>())
        .unwrap()
        .collect();
    assert!(members[0].is_ok());
    assert!(matches!(
        members[1],
        Err(ValuesError::MissingMember { ref path }) if path == "holes.b"
    ));
}

#[test]
fn test_cycles_are_rejected() {
    let store = Store::new();
    let repo: ObjectRef = repository(&store);
    let owner = store
        .get_object(repo.as_ref(), "owner", Class::of::<Owner>())
        .unwrap()
        .unwrap();

    assert!(matches!(
        store.set_object(repo.as_ref(), "itself", Some(repo.clone())),
        Err(ValuesError::Cycle { .. })
    ));
    assert!(matches!(
        store.set_object(owner.as_ref(), "repository", Some(repo.clone())),
        Err(ValuesError::Cycle { .. })
    ));
    assert!(matches!(
        store.add_object(owner.as_ref(), "repositories", repo.clone(), None),
        Err(ValuesError::Cycle { .. })
    ));
    assert_eq!(store.get_values(repo.as_ref()), load_fixture("repository"));
}

#[test]
fn test_rejected_set_objects_keeps_children_bound() {
    let store = Store::new();
    let parent: ObjectRef = Rc::new(EmptyObject::default());
    store
        .set_values(parent.as_ref(), json!({"k": [{"x": 1}]}))
        .unwrap();
    let child = store
        .get_object(parent.as_ref(), "k.0", Class::of::<Owner>())
        .unwrap()
        .unwrap();

    assert!(matches!(
        store.set_objects(parent.as_ref(), "k", Some(Members::list([parent.clone()]))),
        Err(ValuesError::Cycle { .. })
    ));
    assert!(child.values().is_bound());

    store.set_value(child.as_ref(), "x", 2).unwrap();
    assert_eq!(store.get_values(parent.as_ref()), json!({"k": [{"x": 2}]}));
}

#[test]
fn test_keyed_members_follow_the_path_policy() {
    let store = Store::with_options(json_values::StoreOptions {
        path_policy: json_values::PathPolicy::Strict,
        ..json_values::StoreOptions::default()
    });
    let gist = Gist::default();
    let file: ObjectRef = Rc::new(GistFile::default());

    assert!(matches!(
        store.set_objects(&gist, "files", Some(Members::keyed([("a.txt", file.clone())]))),
        Err(ValuesError::InvalidPath { .. })
    ));
    assert!(matches!(
        store.add_object(&gist, "files", file.clone(), Some("a.txt")),
        Err(ValuesError::InvalidPath { .. })
    ));
    assert_eq!(store.get_values(&gist), json!({}));

    store
        .set_objects(&gist, "files", Some(Members::keyed([("a_txt", file)])))
        .unwrap();
    assert_eq!(store.get_values(&gist), json!({"files": {"a_txt": {}}}));
}

#[test]
fn test_build_object_merges_defaults() {
    let store = Store::new();
    let sub = store.build_object_as::<SubObject>(json!({"enabled": false})).unwrap();
    assert_eq!(
        store.get_values(sub.as_ref()),
        json!({"enabled": false, "kind": "sub"})
    );
    assert_eq!(store.get_changes(sub.as_ref()), json!({}));
}

#[test]
fn test_clone_is_independent() {
    let store = Store::new();
    let repo = repository(&store);
    let owner = store.get_object_as::<Owner>(repo.as_ref(), "owner").unwrap().unwrap();
    store.set_value(repo.as_ref(), "name", "changed").unwrap();

    let copy = store.clone_object_as(repo.as_ref()).unwrap();
    assert_eq!(store.get_values(copy.as_ref()), store.get_values(repo.as_ref()));
    assert!(copy.values().cached_paths().is_empty());
    assert_eq!(store.get_changes(copy.as_ref()), json!({}));

    store.set_value(copy.as_ref(), "owner.login", "copy").unwrap();
    store.set_value(owner.as_ref(), "id", 7).unwrap();
    assert_eq!(store.get_value(repo.as_ref(), "owner.login").unwrap(), json!("symfony"));
    assert_eq!(store.get_value(copy.as_ref(), "owner.id").unwrap(), json!(143937));

    let copied_owner = store.clone_object(owner.as_ref()).unwrap();
    assert!(!copied_owner.values().is_bound());
    assert!(downcast::<Owner>(&copied_owner).is_some());
}
