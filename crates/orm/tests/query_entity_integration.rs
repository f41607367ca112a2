//! End-to-end exercises of the public surface: building statements, running
//! them against the mock backend, entity persistence, soft deletes,
//! pagination and the many-to-many set operations.

use std::sync::Arc;

use groundwork_orm::backends::MockResponse;
use groundwork_orm::{
    Attachable, BelongsToMany, CompareOp, DatabaseValue, Entity, EntityDescriptor, MockDatabase,
    OrmError, Paginator, Query, Relation, Row,
};

fn users() -> Arc<EntityDescriptor> {
    Arc::new(EntityDescriptor::new("User", "users").without_timestamps())
}

fn soft_users() -> Arc<EntityDescriptor> {
    Arc::new(
        EntityDescriptor::new("User", "users")
            .without_timestamps()
            .with_soft_deletes(),
    )
}

#[test]
fn connectors_join_predicates_without_a_leading_one() {
    let (sql, bindings) = Query::table("users")
        .where_eq("a", 1)
        .or_where_eq("b", 2)
        .where_cmp("c", CompareOp::Gt, 3)
        .generate_query()
        .unwrap();

    assert_eq!(
        sql,
        "SELECT * FROM `users` WHERE `a` = ? OR `b` = ? AND `c` > ?"
    );
    assert_eq!(bindings.len(), 3);
}

#[test]
fn grouped_batch_compiles_balanced_parentheses() {
    let (sql, bindings) = Query::table("users")
        .where_all([("a", CompareOp::Eq, 1), ("b", CompareOp::Eq, 2)])
        .generate_query()
        .unwrap();

    assert_eq!(sql, "SELECT * FROM `users` WHERE ( `a` = ? AND `b` = ? )");
    assert_eq!(bindings, vec![DatabaseValue::Int(1), DatabaseValue::Int(2)]);
    assert_eq!(
        sql.matches('(').count(),
        sql.matches(')').count()
    );
}

#[test]
fn cloned_builder_is_independent() {
    let original = Query::table("users").where_eq("id", 1);
    let (before, _) = original.generate_query().unwrap();

    let _ = original.clone().where_eq("active", true);

    let (after, _) = original.generate_query().unwrap();
    assert_eq!(before, after);
}

#[test]
fn soft_delete_filter_is_the_first_predicate() {
    let (sql, _) = Query::for_entity(soft_users())
        .where_eq("name", "Ada")
        .generate_query()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` WHERE `deleted_at` IS NULL AND `name` = ?"
    );

    let (sql, _) = Query::for_entity(soft_users())
        .with_deleted()
        .generate_query()
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `users`");

    let (sql, _) = Query::for_entity(soft_users())
        .only_deleted()
        .generate_query()
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `users` WHERE `deleted_at` IS NOT NULL");
}

#[tokio::test]
async fn entity_lifecycle_insert_then_update() {
    let db = MockDatabase::new();
    db.push_response(MockResponse::Inserted(7));

    let mut user = Entity::make(users(), [("name", "Ada")]);
    user.save(&db).await.unwrap();
    assert_eq!(user.identifier(), Some(7));

    user.set("name", "Grace");
    user.save(&db).await.unwrap();

    let executed = db.executed();
    assert!(executed[0].sql.starts_with("INSERT INTO `users`"));
    assert_eq!(
        executed[1].sql,
        "UPDATE `users` SET `name` = ? WHERE `id` = ? LIMIT 1"
    );
}

#[tokio::test]
async fn soft_deleting_entity_restores_cleanly() {
    let db = MockDatabase::new();
    let mut user = Entity::from_row(
        soft_users(),
        Row::from_pairs([("id", 3i64)]),
    );

    user.delete(false, &db).await.unwrap();
    assert!(db
        .last_executed()
        .unwrap()
        .sql
        .starts_with("UPDATE `users` SET `deleted_at` = ?"));

    user.set("deleted_at", DatabaseValue::DateTime(chrono::Utc::now()));
    assert!(user.is_deleted());

    user.restore(&db).await.unwrap();
    assert!(!user.is_deleted());
}

#[tokio::test]
async fn pagination_walks_pages_and_rejects_boundary_moves() {
    let db = MockDatabase::new();
    db.push_rows(vec![Row::from_pairs([("count", 47i64)])]);

    let mut pager = Paginator::new(Query::for_entity(users()), 15, 1, &db)
        .await
        .unwrap();
    assert_eq!(pager.last_page(), 4);

    let page = pager.page(1, &db).await.unwrap();
    assert_eq!(page.current_page, 1);
    assert!(db.last_executed().unwrap().sql.ends_with("LIMIT 0, 15"));

    let page = pager.page(10, &db).await.unwrap();
    assert_eq!(page.current_page, 4);
    assert!(db.last_executed().unwrap().sql.ends_with("LIMIT 45, 15"));

    assert!(matches!(
        pager.next(&db).await.unwrap_err(),
        OrmError::Pagination(_)
    ));
}

#[tokio::test]
async fn sync_reconciles_attached_set() {
    let db = MockDatabase::new();
    let parent = Entity::from_row(users(), Row::from_pairs([("id", 1i64)]));

    let pivot = |ids: &[i64]| -> Vec<Row> {
        ids.iter()
            .map(|id| Row::from_pairs([("role_id", *id)]))
            .collect()
    };

    // Constructor lookup sees [1, 2] attached.
    db.push_rows(pivot(&[1, 2]));
    let relation =
        BelongsToMany::new(&parent, users(), "role_user", "user_id", "role_id", &db).await;

    // sync's lookup, the detach, then attach's re-derivation.
    db.push_rows(pivot(&[1, 2]));
    db.push_response(MockResponse::Affected(1));
    db.push_rows(pivot(&[2]));
    relation.sync(&[2, 3], &db).await.unwrap();

    let deletes: Vec<_> = db
        .executed()
        .iter()
        .filter(|q| q.sql.starts_with("DELETE"))
        .cloned()
        .collect();
    let inserts: Vec<_> = db
        .executed()
        .iter()
        .filter(|q| q.sql.starts_with("INSERT"))
        .cloned()
        .collect();

    // Exactly one detach (id 1) and one attach (id 3).
    assert_eq!(deletes.len(), 1);
    assert_eq!(
        deletes[0].bindings,
        vec![DatabaseValue::Int(1), DatabaseValue::Int(1)]
    );
    assert_eq!(inserts.len(), 1);
    assert_eq!(
        inserts[0].bindings,
        vec![DatabaseValue::Int(3), DatabaseValue::Int(1)]
    );

    // The final attached set reads back as {2, 3}.
    db.push_rows(pivot(&[2, 3]));
    let attached = relation.attached_ids(&db).await;
    assert_eq!(attached, vec![2, 3]);
}

#[tokio::test]
async fn failed_pivot_lookup_reads_as_nothing_attached() {
    let db = MockDatabase::new();
    let parent = Entity::from_row(users(), Row::from_pairs([("id", 1i64)]));

    db.push_error("pivot table unavailable");
    let relation =
        BelongsToMany::new(&parent, users(), "role_user", "user_id", "role_id", &db).await;

    let (sql, _) = relation.query().generate_query().unwrap();
    assert!(sql.ends_with("WHERE FALSE"));

    // id 5 reads as unattached, so attach inserts it unconditionally.
    db.push_error("pivot table unavailable");
    relation.attach(&[5], &db).await.unwrap();
    assert!(db.last_executed().unwrap().sql.starts_with("INSERT"));
}
