//! Integration tests for the membership ledger, join-request queue, rule
//! book and discussion threads
//!
//! Everything runs through `Services` over an in-memory database, the same
//! way the HTTP layer drives it.

use rusqlite::types::Value;
use sangha::db::{groups, members, requests};
use sangha::services::{CreateGroupInput, PageQuery, PostInput, RuleInput, TextInput};
use sangha::{GroupDb, Privacy, Role, SanghaError, Services};
use std::sync::Arc;
use std::thread;

fn services() -> (Arc<GroupDb>, Services) {
    let db = Arc::new(GroupDb::open_in_memory().unwrap());
    let services = Services::with_defaults(db.clone());
    (db, services)
}

fn create(services: &Services, admin: &str, privacy: &str) -> String {
    services
        .groups
        .create_group(
            admin,
            CreateGroupInput {
                name: Some("Bhakti circle".into()),
                description: Some("evening satsang".into()),
                privacy: Some(privacy.into()),
                ..Default::default()
            },
        )
        .unwrap()
        .id
}

fn ledger(db: &GroupDb, group_id: &str) -> Vec<(String, Role)> {
    db.with_conn(|c| members::list_members(c, group_id, None))
        .unwrap()
        .into_iter()
        .map(|m| (m.member_id, m.role))
        .collect()
}

fn member_count(db: &GroupDb, group_id: &str) -> i64 {
    db.with_conn(|c| groups::require_group(c, group_id)).unwrap().member_count
}

/// Ledger cardinality, admin count and stored counter all agree
fn assert_ledger_consistent(db: &GroupDb, group_id: &str) {
    let entries = ledger(db, group_id);
    let admins = entries.iter().filter(|(_, r)| *r == Role::Admin).count();
    assert_eq!(admins, 1, "exactly one admin");
    let stored_admins = db
        .with_conn(|c| members::count_admins(c, group_id))
        .unwrap();
    assert_eq!(stored_admins, 1, "exactly one admin row");
    assert_eq!(member_count(db, group_id), entries.len() as i64, "member count");
}

/// Every row of every group-owned table, in storage order
fn snapshot(db: &GroupDb) -> Vec<String> {
    const TABLES: [&str; 8] = [
        "groups",
        "group_members",
        "join_requests",
        "group_rules",
        "group_posts",
        "post_likes",
        "post_comments",
        "comment_replies",
    ];

    db.with_conn(|conn| {
        let mut rows = Vec::new();
        for table in TABLES {
            let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY rowid", table))?;
            let columns = stmt.column_count();
            let mut query = stmt.query([])?;
            while let Some(row) = query.next()? {
                let values = (0..columns)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<Result<Vec<_>, _>>()?;
                rows.push(format!("{}: {:?}", table, values));
            }
        }
        Ok(rows)
    })
    .unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_private_group_request_accept_flow() {
    let (db, services) = services();

    // 1. founder is the sole admin
    let gid = create(&services, "A", "private");
    assert_eq!(ledger(&db, &gid), vec![("A".to_string(), Role::Admin)]);
    assert_eq!(member_count(&db, &gid), 1);

    // 2. duplicate request rejected, no second row
    let request = services.requests.request(&gid, "B").unwrap();
    assert!(matches!(
        services.requests.request(&gid, "B"),
        Err(SanghaError::DuplicateRequest)
    ));
    assert_eq!(services.requests.list_pending(&gid, "A").unwrap().len(), 1);

    // 3. accept moves B from the queue to the ledger
    let entry = services.requests.accept(&gid, "A", &request.id).unwrap();
    assert_eq!(entry.member_id, "B");
    assert_eq!(entry.role, Role::Member);
    assert!(services.requests.list_pending(&gid, "A").unwrap().is_empty());
    assert_eq!(member_count(&db, &gid), 2);
    assert_ledger_consistent(&db, &gid);
}

#[test]
fn test_member_cannot_set_roles() {
    let (db, services) = services();
    let gid = create(&services, "A", "public");
    services.groups.join(&gid, "B").unwrap();
    services.groups.join(&gid, "C").unwrap();

    // 4.
    let err = services.groups.set_role(&gid, "B", "C", "moderator").unwrap_err();
    assert!(matches!(err, SanghaError::Forbidden(_)));
    assert!(ledger(&db, &gid).contains(&("C".to_string(), Role::Member)));
}

#[test]
fn test_admin_cannot_remove_self() {
    let (db, services) = services();
    let gid = create(&services, "A", "public");

    // 5.
    assert!(matches!(
        services.groups.remove(&gid, "A", "A"),
        Err(SanghaError::TargetIsAdmin)
    ));
    assert_eq!(ledger(&db, &gid), vec![("A".to_string(), Role::Admin)]);
}

#[test]
fn test_double_like_on_own_post() {
    let (_db, services) = services();
    let gid = create(&services, "A", "public");
    services.groups.join(&gid, "B").unwrap();

    // 6.
    let post = services
        .threads
        .create_post(&gid, "B", PostInput { content: Some("Hari Om".into()) })
        .unwrap();
    assert!(services.threads.toggle_like(&post.id, "B").unwrap().liked);
    let after = services.threads.toggle_like(&post.id, "B").unwrap();
    assert!(!after.liked);
    assert_eq!(after.likes_count, 0);

    let page = services.threads.list_posts(&gid, &PageQuery::default()).unwrap();
    assert!(page.posts[0].likes.is_empty());
    assert_eq!(page.posts[0].likes_count, 0);
}

// ============================================================================
// Ledger rules
// ============================================================================

#[test]
fn test_join_public_and_private() {
    let (db, services) = services();
    let public = create(&services, "A", "public");
    let private = create(&services, "A", "private");

    services.groups.join(&public, "B").unwrap();
    assert!(matches!(services.groups.join(&public, "B"), Err(SanghaError::AlreadyMember)));
    assert!(matches!(services.groups.join(&private, "B"), Err(SanghaError::PrivacyViolation)));
    assert!(matches!(services.requests.request(&public, "C"), Err(SanghaError::NotPrivate)));

    // already a member wins over privacy
    assert!(matches!(services.groups.join(&private, "A"), Err(SanghaError::AlreadyMember)));

    assert_ledger_consistent(&db, &public);
    assert_ledger_consistent(&db, &private);
}

#[test]
fn test_role_transitions_never_touch_admin() {
    let (db, services) = services();
    let gid = create(&services, "A", "public");
    services.groups.join(&gid, "B").unwrap();

    let promoted = services.groups.set_role(&gid, "A", "B", "moderator").unwrap();
    assert_eq!(promoted.role, Role::Moderator);
    let demoted = services.groups.set_role(&gid, "A", "B", "member").unwrap();
    assert_eq!(demoted.role, Role::Member);

    assert!(matches!(
        services.groups.set_role(&gid, "A", "B", "admin"),
        Err(SanghaError::InvalidRole(_))
    ));
    assert!(matches!(
        services.groups.set_role(&gid, "A", "A", "member"),
        Err(SanghaError::TargetIsAdmin)
    ));
    assert!(matches!(
        services.groups.set_role(&gid, "A", "Z", "member"),
        Err(SanghaError::TargetNotMember(_))
    ));
    assert!(matches!(
        services.groups.remove(&gid, "A", "Z"),
        Err(SanghaError::TargetNotMember(_))
    ));
    assert!(matches!(services.groups.leave(&gid, "A"), Err(SanghaError::AdminCannotLeave)));

    // moderator is not an admin
    services.groups.set_role(&gid, "A", "B", "moderator").unwrap();
    assert!(matches!(
        services.groups.remove(&gid, "B", "A"),
        Err(SanghaError::Forbidden(_))
    ));

    assert_ledger_consistent(&db, &gid);
}

#[test]
fn test_leave_and_remove_keep_count() {
    let (db, services) = services();
    let gid = create(&services, "A", "public");
    for actor in ["B", "C", "D"] {
        services.groups.join(&gid, actor).unwrap();
    }
    assert_eq!(member_count(&db, &gid), 4);

    services.groups.leave(&gid, "B").unwrap();
    services.groups.remove(&gid, "A", "C").unwrap();
    assert_eq!(member_count(&db, &gid), 2);
    assert!(matches!(services.groups.leave(&gid, "B"), Err(SanghaError::NotMember(_))));
    assert_ledger_consistent(&db, &gid);
}

#[test]
fn test_request_and_entry_are_exclusive() {
    let (db, services) = services();
    let gid = create(&services, "A", "private");
    let request = services.requests.request(&gid, "B").unwrap();
    services.requests.accept(&gid, "A", &request.id).unwrap();

    assert!(matches!(services.requests.request(&gid, "B"), Err(SanghaError::AlreadyMember)));
    let pending = db.with_conn(|c| requests::find_pending(c, &gid, "B")).unwrap();
    assert!(pending.is_none());

    // accepting twice finds nothing to accept
    assert!(matches!(
        services.requests.accept(&gid, "A", &request.id),
        Err(SanghaError::RequestNotFound(_))
    ));
    assert_ledger_consistent(&db, &gid);
}

#[test]
fn test_decline_discards_request_only() {
    let (db, services) = services();
    let gid = create(&services, "A", "private");
    let request = services.requests.request(&gid, "B").unwrap();

    services.requests.decline(&gid, "A", &request.id).unwrap();
    assert!(services.requests.list_pending(&gid, "A").unwrap().is_empty());
    assert_eq!(ledger(&db, &gid).len(), 1);

    // B may ask again after a decline
    assert!(services.requests.request(&gid, "B").is_ok());
}

#[test]
fn test_request_of_other_group_is_not_found() {
    let (_db, services) = services();
    let g1 = create(&services, "A", "private");
    let g2 = create(&services, "A", "private");
    let request = services.requests.request(&g1, "B").unwrap();

    assert!(matches!(
        services.requests.accept(&g2, "A", &request.id),
        Err(SanghaError::RequestNotFound(_))
    ));
    assert_eq!(services.requests.list_pending(&g1, "A").unwrap().len(), 1);
}

// ============================================================================
// Authorization gate
// ============================================================================

#[test]
fn test_admin_actions_by_others_change_nothing() {
    let (db, services) = services();
    let gid = create(&services, "A", "private");
    let request = services.requests.request(&gid, "R").unwrap();
    let rule = services
        .rules
        .add(
            &gid,
            "A",
            RuleInput {
                title: Some("No gossip".into()),
                description: None,
            },
        )
        .unwrap();

    // give B a ledger entry without going through join (group is private)
    let r2 = services.requests.request(&gid, "B").unwrap();
    services.requests.accept(&gid, "A", &r2.id).unwrap();

    let before = snapshot(&db);

    for actor in ["B", "outsider"] {
        let attempts: Vec<Result<(), SanghaError>> = vec![
            services.groups.set_role(&gid, actor, "B", "moderator").map(drop),
            services.groups.remove(&gid, actor, "B"),
            services.groups.delete_group(actor, &gid),
            services.requests.list_pending(&gid, actor).map(drop),
            services.requests.accept(&gid, actor, &request.id).map(drop),
            services.requests.decline(&gid, actor, &request.id),
            services
                .rules
                .add(
                    &gid,
                    actor,
                    RuleInput {
                        title: Some("Mine".into()),
                        description: None,
                    },
                )
                .map(drop),
            services
                .rules
                .update(
                    &gid,
                    actor,
                    &rule.id,
                    RuleInput {
                        title: Some("Changed".into()),
                        description: None,
                    },
                )
                .map(drop),
            services.rules.remove(&gid, actor, &rule.id),
        ];

        for (i, attempt) in attempts.into_iter().enumerate() {
            let err = attempt.unwrap_err();
            assert!(
                matches!(err, SanghaError::Forbidden(_)),
                "attempt {} by {} gave {:?}",
                i,
                actor,
                err
            );
            assert_eq!(err.status_code(), 403);
        }
    }

    assert_eq!(snapshot(&db), before);
}

// ============================================================================
// Discovery, rules, threads
// ============================================================================

#[test]
fn test_private_groups_hidden_from_outsiders() {
    let (_db, services) = services();
    let public = create(&services, "A", "public");
    let private = create(&services, "A", "private");

    let visible: Vec<_> = services
        .groups
        .list_groups("outsider", &Default::default())
        .unwrap()
        .into_iter()
        .map(|g| g.id)
        .collect();
    assert_eq!(visible, vec![public.clone()]);

    let admin_view = services.groups.list_groups("A", &Default::default()).unwrap();
    assert_eq!(admin_view.len(), 2);
    assert_eq!(admin_view[0].id, private);
    assert_eq!(admin_view[0].privacy, Privacy::Private);
}

#[test]
fn test_group_detail_reports_viewer_state() {
    let (_db, services) = services();
    let gid = create(&services, "A", "private");
    services.requests.request(&gid, "B").unwrap();

    let as_admin = services.groups.get_group("A", &gid).unwrap();
    assert_eq!(as_admin.viewer_role, Some(Role::Admin));
    assert!(!as_admin.has_pending_request);

    let as_requester = services.groups.get_group("B", &gid).unwrap();
    assert_eq!(as_requester.viewer_role, None);
    assert!(as_requester.has_pending_request);
}

#[test]
fn test_delete_group_cascades() {
    let (db, services) = services();
    let gid = create(&services, "A", "public");
    services.groups.join(&gid, "B").unwrap();
    let post = services
        .threads
        .create_post(&gid, "B", PostInput { content: Some("Jai".into()) })
        .unwrap();
    services.threads.toggle_like(&post.id, "A").unwrap();
    let comment = services
        .threads
        .add_comment(&post.id, "A", TextInput { text: Some("Jai Jai".into()) })
        .unwrap();
    services
        .threads
        .add_reply(&post.id, &comment.id, "B", TextInput { text: Some("!".into()) })
        .unwrap();

    services.groups.delete_group("A", &gid).unwrap();

    assert!(snapshot(&db).is_empty());
    assert!(matches!(
        services.groups.get_group("A", &gid),
        Err(SanghaError::GroupNotFound(_))
    ));
    assert!(matches!(
        services.threads.toggle_like(&post.id, "A"),
        Err(SanghaError::PostNotFound(_))
    ));
}

#[test]
fn test_pagination_pages_newest_first() {
    let (_db, services) = services();
    let gid = create(&services, "A", "public");
    for n in 1..=5 {
        services
            .threads
            .create_post(&gid, "A", PostInput { content: Some(format!("post {}", n)) })
            .unwrap();
    }

    let query = PageQuery {
        page: Some(2),
        page_size: Some(2),
    };
    let page = services.threads.list_posts(&gid, &query).unwrap();
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.current_page, 2);
    let contents: Vec<_> = page.posts.iter().map(|p| p.content.as_str()).collect();
    assert_eq!(contents, vec!["post 3", "post 2"]);

    let beyond = PageQuery {
        page: Some(9),
        page_size: Some(2),
    };
    assert!(services.threads.list_posts(&gid, &beyond).unwrap().posts.is_empty());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_joins_by_one_actor_create_one_entry() {
    let (db, services) = services();
    let services = Arc::new(services);
    let gid = create(&services, "A", "public");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let services = services.clone();
            let gid = gid.clone();
            thread::spawn(move || services.groups.join(&gid, "B").is_ok())
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(ledger(&db, &gid).len(), 2);
    assert_ledger_consistent(&db, &gid);
}

#[test]
fn test_concurrent_churn_keeps_count_consistent() {
    let (db, services) = services();
    let services = Arc::new(services);
    let gid = create(&services, "A", "public");

    let handles: Vec<_> = (0..6)
        .map(|worker| {
            let services = services.clone();
            let gid = gid.clone();
            thread::spawn(move || {
                let actor = format!("actor-{}", worker);
                for round in 0..10 {
                    let _ = services.groups.join(&gid, &actor);
                    if round % 3 == 0 {
                        let _ = services.groups.leave(&gid, &actor);
                    }
                    if round % 4 == 0 {
                        let _ = services.groups.remove(&gid, "A", &format!("actor-{}", (worker + 1) % 6));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_ledger_consistent(&db, &gid);
}

#[test]
fn test_concurrent_like_toggles_stay_in_sync() {
    let (_db, services) = services();
    let services = Arc::new(services);
    let gid = create(&services, "A", "public");
    let post = services
        .threads
        .create_post(&gid, "A", PostInput { content: Some("Om".into()) })
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let services = services.clone();
            let post_id = post.id.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    services.threads.toggle_like(&post_id, "B").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // 20 toggles by one actor leave them out of the set
    let page = services.threads.list_posts(&gid, &PageQuery::default()).unwrap();
    assert!(page.posts[0].likes.is_empty());
    assert_eq!(page.posts[0].likes_count, 0);
}
