//! Publishing, group aggregation and propagation.

mod common;

use std::sync::Arc;

use common::*;
use repo_routing::config::ProxyMode;
use repo_routing::events::RoutingEvent;
use repo_routing::manager::{DStatus, PStatus};
use repo_routing::prefix::PrefixSource;
use repo_routing::repository::Repository;
use repo_routing::storage::ContentStore;
use repo_routing::RequestAdmissionFilter;
use tokio::sync::broadcast;

fn published(events: &mut broadcast::Receiver<RoutingEvent>) -> Vec<String> {
    let mut ids = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RoutingEvent::PrefixFilePublished { repository } = event {
            ids.push(repository);
        }
    }
    ids
}

#[tokio::test]
async fn test_hosted_end_to_end() {
    let hosted = Repository::hosted(
        "releases",
        memory_store(&[
            "/archetype-catalog.xml",
            "/archetype-catalog.xml.sha1",
            "/archetype-catalog.xml.md5",
            "/org/sonatype/artifact/1.0/a.jar",
            "/org/apache/artifact/1.0/a.jar",
        ]),
    );
    let manager = start_manager(vec![hosted]);
    settle(&manager).await;

    let source = manager.prefix_source_for("releases").unwrap();
    assert!(source.supported());
    assert_eq!(
        sorted(source.read_entries().unwrap()),
        vec![
            "/archetype-catalog.xml",
            "/archetype-catalog.xml.md5",
            "/archetype-catalog.xml.sha1",
            "/org/apache",
            "/org/sonatype",
        ]
    );
    let status = manager.status_for("releases").unwrap();
    assert_eq!(status.publishing.status, PStatus::Published);
    assert_eq!(status.publishing.message, "Prefix file published successfully.");
    assert_eq!(status.publishing.path.as_deref(), Some("/repositories/releases/.meta/prefixes.txt"));
    assert_eq!(status.discovery.status, DStatus::NotAProxy);
}

#[tokio::test]
async fn test_group_aggregates_proxies() {
    let apache = MockUpstream::start(vec![(
        "/.meta/prefixes.txt",
        MockResponse::ok(prefix_file(&["/org/apache"])),
    )])
    .await;
    let sonatype = MockUpstream::start(vec![(
        "/.meta/prefixes.txt",
        MockResponse::ok(prefix_file(&["/org/sonatype", "/com/sonatype"])),
    )])
    .await;
    let manager = start_manager(vec![
        Repository::proxy("apache", apache.url("/"), memory_store(&[])),
        Repository::proxy("sonatype", sonatype.url("/"), memory_store(&[])),
        Repository::group("g1", &["apache", "sonatype"], memory_store(&[])),
    ]);
    settle(&manager).await;

    let source = manager.prefix_source_for("g1").unwrap();
    assert!(source.supported());
    assert_eq!(
        sorted(source.read_entries().unwrap()),
        vec!["/com/sonatype", "/org/apache", "/org/sonatype"]
    );
    assert_eq!(manager.status_for("g1").unwrap().discovery.status, DStatus::NotAProxy);
}

#[tokio::test]
async fn test_membership_change_propagates_in_order() {
    let manager = start_manager(vec![
        Repository::hosted("a", memory_store(&["/org/a/1.0/a.jar"])),
        Repository::hosted("b", memory_store(&["/com/b/1.0/b.jar"])),
        Repository::group("g1", &["a"], memory_store(&[])),
        Repository::group("g2", &["g1"], memory_store(&[])),
        Repository::group("g3", &["g2", "g1"], memory_store(&[])),
    ]);
    settle(&manager).await;
    assert_eq!(
        manager.prefix_source_for("g3").unwrap().read_entries().unwrap(),
        vec!["/org/a"]
    );

    let mut events = manager.registry().events().subscribe();
    manager.registry().set_members("g1", &["a", "b"]).unwrap();

    // propagation completed before set_members returned
    assert_eq!(published(&mut events), vec!["g1", "g2", "g3"]);
    assert_eq!(
        manager.prefix_source_for("g3").unwrap().read_entries().unwrap(),
        vec!["/org/a", "/com/b"]
    );
}

#[tokio::test]
async fn test_group_blocked_by_member() {
    let central = Repository::proxy("central", refused_url(), memory_store(&[]))
        .with_proxy_mode(ProxyMode::BlockedManual);
    let manager = start_manager(vec![
        Repository::hosted("releases", memory_store(&["/org/foo/1.0/foo.jar"])),
        central,
        Repository::group("public", &["releases", "central"], memory_store(&[])),
    ]);
    settle(&manager).await;

    let status = manager.status_for("public").unwrap();
    assert_eq!(status.publishing.status, PStatus::NotPublished);
    assert!(status.publishing.message.ends_with(": central"));

    let mut events = manager.registry().events().subscribe();
    manager.registry().remove("central");
    assert_eq!(published(&mut events), vec!["public"]);
    let source = manager.prefix_source_for("public").unwrap();
    assert_eq!(source.read_entries().unwrap(), vec!["/org/foo"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_membership_cycle_settles() {
    let registry = registry();
    let mut events = registry.events().subscribe();
    registry.add(Repository::hosted("leaf", memory_store(&["/org/foo/1.0/foo.jar"])));
    registry.add(Repository::group("a", &["leaf", "b"], memory_store(&[])));
    registry.add(Repository::group("b", &["a"], memory_store(&[])));
    let manager = manager_for(registry);
    manager.startup();
    settle(&manager).await;

    for id in ["a", "b"] {
        let source = manager.prefix_source_for(id).unwrap();
        assert!(source.supported(), "{}", id);
        assert_eq!(source.read_entries().unwrap(), vec!["/org/foo"], "{}", id);
    }
    let publishes = published(&mut events).len();
    assert!(publishes < 20, "{} publish events", publishes);

    // a nudge through the cycle settles again
    manager.update_prefix_file("a").unwrap();
    settle(&manager).await;
    assert!(manager.running_jobs().is_empty());
    manager.shutdown();
}

#[tokio::test]
async fn test_out_of_service_member_is_ignored() {
    let manager = start_manager(vec![
        Repository::hosted("releases", memory_store(&["/org/foo/1.0/foo.jar"])),
        Repository::hosted("legacy", memory_store(&["/net/old/1.0/old.jar"])).with_in_service(false),
        Repository::group("public", &["releases", "legacy"], memory_store(&[])),
    ]);
    settle(&manager).await;

    let source = manager.prefix_source_for("public").unwrap();
    assert!(source.supported());
    assert_eq!(source.read_entries().unwrap(), vec!["/org/foo"]);
    assert!(!manager.prefix_source_for("legacy").unwrap().exists());
}

#[tokio::test]
async fn test_stored_items_update_hosted_and_groups() {
    let manager = start_manager(vec![
        Repository::hosted("releases", memory_store(&["/org/foo/1.0/foo.jar"])),
        Repository::group("public", &["releases"], memory_store(&[])),
    ]);
    settle(&manager).await;

    manager
        .registry()
        .store_item("releases", "/com/example/lib/1.0/lib-1.0.jar", b"jar")
        .unwrap();
    let source = manager.prefix_source_for("releases").unwrap();
    assert_eq!(source.read_entries().unwrap(), vec!["/org/foo", "/com/example"]);
    settle(&manager).await;
    assert_eq!(
        manager.prefix_source_for("public").unwrap().read_entries().unwrap(),
        vec!["/org/foo", "/com/example"]
    );

    assert!(manager.registry().delete_item("releases", "/com/example").unwrap());
    assert_eq!(source.read_entries().unwrap(), vec!["/org/foo"]);
    settle(&manager).await;
    assert_eq!(
        manager.prefix_source_for("public").unwrap().read_entries().unwrap(),
        vec!["/org/foo"]
    );
}

#[tokio::test]
async fn test_admission_follows_published_file() {
    let upstream = MockUpstream::start(vec![(
        "/.meta/prefixes.txt",
        MockResponse::ok(prefix_file(&["/org/apache"])),
    )])
    .await;
    let registry = registry();
    let manager = manager_for(registry.clone());
    let filter = Arc::new(RequestAdmissionFilter::new(manager.clone()));
    registry.events().register(filter.clone());

    registry.add(Repository::proxy("central", upstream.url("/"), memory_store(&[])));
    assert!(filter.allowed("central", "/com/example/lib/1.0/lib-1.0.jar"));

    manager.startup();
    settle(&manager).await;

    assert!(filter.allowed("central", "/org/apache/maven/maven-core/3.9.0/maven-core-3.9.0.jar"));
    assert!(!filter.allowed("central", "/com/example/lib/1.0/lib-1.0.jar"));
    assert!(filter.allowed("central", "/.meta/prefixes.txt"));
}

#[tokio::test]
async fn test_existing_files_are_announced_on_startup() {
    let store = memory_store(&["/org/foo/1.0/foo.jar"]);
    let body = prefix_file(&["/org/apache"]);
    store.write("/.meta/prefixes.txt", body.as_bytes()).unwrap();

    let registry = registry();
    registry.add(Repository::proxy("central", refused_url(), store));
    let mut events = registry.events().subscribe();
    let manager = manager_for(registry);
    manager.startup();

    assert_eq!(
        events.recv().await.unwrap(),
        RoutingEvent::PrefixFilePublished {
            repository: "central".to_string()
        }
    );
    manager.shutdown();
}
