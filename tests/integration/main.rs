//! Integration tests for offline-worker

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const MANIFEST_V1: &str = r#"{
        "groups": {"app": {"version": "v1", "urls": {"/index.html": {}, "/a.js": {}}}},
        "routing": {"index": "/index.html", "routes": {"/": {}}},
        "dynamic": {"rules": [{"name": "api", "pattern": "/api/*", "strategy": "cacheFirst"}]}
    }"#;

    const MANIFEST_V2: &str = r#"{
        "groups": {"app": {"version": "v1", "urls": {"/index.html": {}, "/b.js": {}}}}
    }"#;

    /// A scratch directory with a config that keeps everything inside it
    struct Scratch {
        dir: TempDir,
    }

    impl Scratch {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let config = format!(
                "[general]\njournal = false\n\n[cache]\ndir = {:?}\n",
                dir.path().join("caches")
            );
            std::fs::write(dir.path().join("config.toml"), config).unwrap();
            Self { dir }
        }

        fn file(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, contents).unwrap();
            path
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("offline-worker");
            cmd.env("OFFLINE_WORKER_CONFIG", self.dir.path().join("config.toml"));
            cmd
        }
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("offline-worker")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("content-addressed caching"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("offline-worker")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("offline-worker"));
    }

    #[test]
    fn config_path_honours_env() {
        let scratch = Scratch::new();
        scratch
            .cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let scratch = Scratch::new();
        scratch
            .cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[worker]"))
            .stdout(predicate::str::contains("journal = false"));
    }

    #[test]
    fn inspect_json() {
        let scratch = Scratch::new();
        let manifest = scratch.file("ngsw.json", MANIFEST_V1);
        scratch
            .cmd()
            .arg("inspect")
            .arg(&manifest)
            .args(["--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""cache": "app:v1""#))
            .stdout(predicate::str::contains(r#""cache": "dynamic:api""#))
            .stdout(predicate::str::contains(r#""index": "/index.html""#));
    }

    #[test]
    fn inspect_rejects_unversioned_entry_without_hash() {
        let scratch = Scratch::new();
        let manifest = scratch.file("bad.json", r#"{"groups": {"app": {"urls": {"/a.js": {}}}}}"#);
        scratch
            .cmd()
            .arg("inspect")
            .arg(&manifest)
            .assert()
            .failure()
            .stderr(predicate::str::contains("/a.js"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn diff_reports_added_and_removed() {
        let scratch = Scratch::new();
        let v1 = scratch.file("v1.json", MANIFEST_V1);
        let v2 = scratch.file("v2.json", MANIFEST_V2);
        scratch
            .cmd()
            .arg("diff")
            .arg(&v2)
            .arg(&v1)
            .args(["-f", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""changed": true"#))
            .stdout(predicate::str::contains("/b.js"))
            .stdout(predicate::str::contains("/a.js"));
    }

    #[test]
    fn activate_without_install_fails_with_hint() {
        let scratch = Scratch::new();
        scratch
            .cmd()
            .arg("activate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("no install has completed"))
            .stderr(predicate::str::contains("offline-worker install"));
    }

    #[test]
    fn status_on_empty_cache() {
        let scratch = Scratch::new();
        scratch
            .cmd()
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""active": null"#))
            .stdout(predicate::str::contains(r#""caches": []"#));
    }

    #[test]
    fn install_from_unreachable_origin_fails() {
        let scratch = Scratch::new();
        scratch
            .cmd()
            .args(["install", "--origin", "http://127.0.0.1:9"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn fetch_requires_url() {
        let scratch = Scratch::new();
        scratch.cmd().arg("fetch").assert().failure();
    }

    #[test]
    fn fetch_rejects_unknown_method() {
        let scratch = Scratch::new();
        scratch
            .cmd()
            .args(["fetch", "-X", "BREW", "/a.js"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unsupported HTTP method"));
    }

    #[test]
    fn completions_bash() {
        cargo_bin_cmd!("offline-worker")
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("offline-worker"));
    }
}

mod lifecycle_tests {
    use offline_worker::adapter::{MemoryCacheStorage, MemoryOrigin, Request, Response};
    use offline_worker::cache::{ACTIVE_SLOT, INSTALLING_SLOT};
    use offline_worker::config::WorkerConfig;
    use offline_worker::driver::Driver;
    use offline_worker::error::WorkerError;
    use offline_worker::log::Logger;
    use offline_worker::manifest::Manifest;
    use offline_worker::worker::Message;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const MANIFEST_URL: &str = "/ngsw-manifest.json";

    struct Harness {
        origin: Arc<MemoryOrigin>,
        storage: Arc<MemoryCacheStorage>,
        driver: Driver,
    }

    impl Harness {
        fn new() -> Self {
            let origin = Arc::new(MemoryOrigin::new());
            let storage = Arc::new(MemoryCacheStorage::new());
            let driver = Self::driver_over(&origin, &storage);
            Self {
                origin,
                storage,
                driver,
            }
        }

        fn driver_over(origin: &Arc<MemoryOrigin>, storage: &Arc<MemoryCacheStorage>) -> Driver {
            Driver::new(
                WorkerConfig::default(),
                storage.clone(),
                origin.clone(),
                Logger::new(50),
            )
        }

        /// A second driver over the same cache, as after a restart
        fn restarted(&self) -> Driver {
            Self::driver_over(&self.origin, &self.storage)
        }

        fn publish(&self, manifest: &str) -> String {
            self.origin.respond_text(MANIFEST_URL, manifest);
            Manifest::parse(manifest).unwrap().hash().to_string()
        }

        async fn body(&self, url: &str) -> String {
            self.driver.fetch(&Request::get(url)).await.text()
        }

        async fn cache_names(&self) -> Vec<String> {
            let mut names = self.driver.cache().names().await.unwrap();
            names.sort();
            names
        }
    }

    fn cache_of(manifest: &str, group: &str) -> String {
        Manifest::parse(manifest)
            .unwrap()
            .group(group)
            .unwrap()
            .cache_name()
    }

    const V1: &str = r#"{"groups": {"app": {"urls": {"/a.js": {"hash": "A"}, "/b.js": {"hash": "B1"}}}}}"#;
    const V2: &str = r#"{"groups": {"app": {"urls": {"/a.js": {"hash": "A"}, "/b.js": {"hash": "B2"}}}}}"#;

    #[tokio::test]
    async fn install_activate_and_serve_from_cache() {
        let h = Harness::new();
        let hash = h.publish(V1);
        h.origin.respond_text("/a.js", "a1");
        h.origin.respond_text("/b.js", "b1");

        let status = h.driver.install().await.unwrap();
        assert_eq!(status.installing.as_deref(), Some(hash.as_str()));
        assert!(status.active.is_none());

        let status = h.driver.activate().await.unwrap();
        assert_eq!(status.active.as_deref(), Some(hash.as_str()));
        assert!(status.installing.is_none());

        h.origin.fail("/a.js", "offline");
        assert_eq!(h.body("/a.js").await, "a1");
        assert_eq!(h.origin.hits("/a.js"), 1);
    }

    #[tokio::test]
    async fn update_reuses_unchanged_entries_and_cleans_old_caches() {
        let h = Harness::new();
        h.publish(V1);
        h.origin.respond_text("/a.js", "a1");
        h.origin.respond_text("/b.js", "b1");
        h.driver.install().await.unwrap();
        h.driver.activate().await.unwrap();
        assert_eq!(h.origin.hits("/a.js"), 1);

        h.publish(V2);
        h.origin.fail("/a.js", "must not be refetched");
        h.origin.respond_text("/b.js", "b2");
        h.driver.install().await.unwrap();
        assert_eq!(h.origin.hits("/a.js"), 1);

        // The old version keeps serving until activation
        assert_eq!(h.body("/b.js").await, "b1");

        h.driver.activate().await.unwrap();
        assert_eq!(h.body("/a.js").await, "a1");
        assert_eq!(h.body("/b.js").await, "b2");

        let mut expected = vec![ACTIVE_SLOT.to_string(), cache_of(V2, "app")];
        expected.sort();
        assert_eq!(h.cache_names().await, expected);
    }

    #[tokio::test]
    async fn failed_install_leaves_active_untouched() {
        let h = Harness::new();
        let v1 = h.publish(V1);
        h.origin.respond_text("/a.js", "a1");
        h.origin.respond_text("/b.js", "b1");
        h.driver.install().await.unwrap();
        h.driver.activate().await.unwrap();

        h.publish(V2);
        h.origin.fail("/b.js", "connection reset");
        let err = h.driver.install().await.unwrap_err();
        assert!(matches!(err, WorkerError::InstallFailed(_)));

        let status = h.driver.status().await;
        assert_eq!(status.active.as_deref(), Some(v1.as_str()));
        assert!(status.installing.is_none());
        assert_eq!(h.body("/b.js").await, "b1");

        let err = h.driver.activate().await.unwrap_err();
        assert!(matches!(err, WorkerError::NothingToActivate));
    }

    #[tokio::test]
    async fn failed_install_removes_caches_it_filled() {
        const V3: &str = r#"{"groups": {"app": {"urls": {"/a.js": {"hash": "A"}, "/b.js": {"hash": "B3"}}}}}"#;

        let h = Harness::new();
        h.publish(V1);
        h.origin.respond_text("/a.js", "a1");
        h.origin.respond_text("/b.js", "b1");
        h.driver.install().await.unwrap();
        h.driver.activate().await.unwrap();

        h.publish(V2);
        h.origin.fail("/b.js", "connection reset");
        h.driver.install().await.unwrap_err();

        let mut expected = vec![ACTIVE_SLOT.to_string(), cache_of(V1, "app")];
        expected.sort();
        assert_eq!(h.cache_names().await, expected);

        h.publish(V3);
        h.origin.respond_text("/b.js", "b3");
        h.driver.install().await.unwrap();
        h.driver.activate().await.unwrap();

        let mut expected = vec![ACTIVE_SLOT.to_string(), cache_of(V3, "app")];
        expected.sort();
        assert_eq!(h.cache_names().await, expected);
        assert!(!h.cache_names().await.contains(&cache_of(V2, "app")));
    }

    #[tokio::test]
    async fn overlapping_installs_run_one_after_another() {
        let h = Harness::new();
        h.publish(V1);
        h.origin.respond_text("/a.js", "a");
        h.origin
            .respond_after("/b.js", Duration::from_millis(80), Response::ok("b"));

        let republish = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            h.publish(V2)
        };
        let (first, second, v2) = tokio::join!(h.driver.install(), h.driver.install(), republish);

        let v1 = Manifest::parse(V1).unwrap().hash().to_string();
        assert_eq!(first.unwrap().installing.as_deref(), Some(v1.as_str()));
        assert_eq!(second.unwrap().installing.as_deref(), Some(v2.as_str()));
        assert_eq!(h.driver.status().await.installing.as_deref(), Some(v2.as_str()));

        let mut expected = vec![INSTALLING_SLOT.to_string(), cache_of(V2, "app")];
        expected.sort();
        assert_eq!(h.cache_names().await, expected);
    }

    #[tokio::test]
    async fn restart_restores_active_version() {
        let h = Harness::new();
        let hash = h.publish(V1);
        h.origin.respond_text("/a.js", "a1");
        h.origin.respond_text("/b.js", "b1");
        h.driver.install().await.unwrap();
        h.driver.activate().await.unwrap();

        let restarted = h.restarted();
        let status = restarted.restore().await.unwrap();
        assert_eq!(status.active.as_deref(), Some(hash.as_str()));

        h.origin.fail("/a.js", "offline");
        let response = restarted.fetch(&Request::get("/a.js")).await;
        assert_eq!(response.text(), "a1");
    }

    #[tokio::test]
    async fn cache_first_rule_keeps_first_answer() {
        let h = Harness::new();
        h.publish(
            r#"{"dynamic": {"rules": [{"name": "api", "pattern": "/api/*", "strategy": "cacheFirst"}]}}"#,
        );
        h.driver.install().await.unwrap();
        h.driver.activate().await.unwrap();

        h.origin.respond_text("/api/users", "first");
        assert_eq!(h.body("/api/users").await, "first");
        h.driver.settle().await;

        h.origin.respond_text("/api/users", "second");
        assert_eq!(h.body("/api/users").await, "first");
        assert_eq!(h.origin.hits("/api/users"), 1);
        assert!(h.cache_names().await.contains(&"dynamic:api".to_string()));
    }

    #[tokio::test]
    async fn network_first_falls_back_to_cache_after_timeout() {
        let h = Harness::new();
        h.publish(
            r#"{"dynamic": {"rules": [{"name": "feed", "pattern": "/feed", "strategy": "networkFirst", "waitForNetworkMs": 10}]}}"#,
        );
        h.driver.install().await.unwrap();
        h.driver.activate().await.unwrap();

        h.origin.respond_text("/feed", "fresh");
        assert_eq!(h.body("/feed").await, "fresh");
        h.driver.settle().await;

        h.origin.hang("/feed");
        assert_eq!(h.body("/feed").await, "fresh");
    }

    #[tokio::test]
    async fn routes_serve_the_index() {
        let h = Harness::new();
        h.publish(
            r#"{
                "groups": {"app": {"version": "1", "urls": {"/hello.txt": {}}}},
                "routing": {"index": "/hello.txt", "routes": {"/goodbye.txt": {}}}
            }"#,
        );
        h.origin.respond_text("/hello.txt", "hello");
        h.driver.install().await.unwrap();
        h.driver.activate().await.unwrap();

        assert_eq!(h.body("/goodbye.txt").await, "hello");
        assert_eq!(h.origin.hits("/goodbye.txt"), 0);
    }

    #[tokio::test]
    async fn dev_manifest_bypasses_caches() {
        let h = Harness::new();
        h.publish(r#"{"dev": true, "groups": {"app": {"version": "1", "urls": {"/a.js": {}}}}}"#);
        h.origin.respond_text("/a.js", "live");
        h.driver.install().await.unwrap();
        h.driver.activate().await.unwrap();
        assert_eq!(h.origin.hits("/a.js"), 0);

        assert_eq!(h.body("/a.js").await, "live");
        assert_eq!(h.origin.hits("/a.js"), 1);
    }

    #[tokio::test]
    async fn messages_and_push_subscriptions() {
        let h = Harness::new();
        h.publish(V1);
        h.origin.respond_text("/a.js", "a1");
        h.origin.respond_text("/b.js", "b1");
        h.driver.install().await.unwrap();
        h.driver.activate().await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        h.driver
            .message(Message::new(json!({"cmd": "ping"}), tx.clone()))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), json!({"pong": true}));

        h.driver
            .message(Message::new(json!({"cmd": "checkUpdate"}), tx.clone()))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), json!({"updatePending": false}));

        h.driver
            .message(Message::new(json!({"cmd": "push"}), tx))
            .await
            .unwrap();
        h.driver.push(json!({"hello": "world"})).await;
        assert_eq!(rx.recv().await.unwrap(), json!({"hello": "world"}));
    }
}
