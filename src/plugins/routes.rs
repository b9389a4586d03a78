//! Route redirection plugin
//!
//! Single-page applications answer many navigation URLs with one index
//! document. When the manifest declares `routing`, GET requests for `/` and
//! for any declared route are answered as if the index URL had been
//! requested. The rewritten request runs through the whole pipeline again,
//! so the index is served from whichever plugin caches it.

use crate::adapter::{strip_query, Request};
use crate::manifest::{Manifest, RouteRule, Routing};
use crate::task::task;
use crate::worker::{Instructions, Operation, Plugin, VersionWorker};
use std::sync::Arc;

pub struct RoutesPlugin {
    routing: Option<Routing>,
}

impl RoutesPlugin {
    pub fn new(manifest: &Manifest) -> Self {
        Self {
            routing: manifest.routing().cloned(),
        }
    }

    /// URL a request should be served from instead, if any
    pub fn rewrite(&self, request: &Request) -> Option<String> {
        let routing = self.routing.as_ref()?;
        if !request.is_get() {
            return None;
        }

        let path = request.path();
        if path == strip_query(&routing.index) {
            return None;
        }
        if path == "/" || routing.routes.iter().any(|(route, rule)| route_matches(route, rule, path)) {
            return Some(routing.index.clone());
        }
        None
    }
}

fn route_matches(route: &str, rule: &RouteRule, path: &str) -> bool {
    let matched = if rule.prefix {
        path.starts_with(route)
    } else {
        path == route
    };
    matched && !(rule.only_without_extension && has_extension(path))
}

fn has_extension(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .map(|segment| segment.contains('.'))
        .unwrap_or(false)
}

impl Plugin for RoutesPlugin {
    fn name(&self) -> &'static str {
        "routes"
    }

    fn fetch(
        &self,
        worker: &Arc<VersionWorker>,
        request: &Request,
        instructions: &mut Instructions,
        _carry_on: &mut Vec<Operation>,
    ) {
        let Some(index) = self.rewrite(request) else {
            return;
        };

        let worker = Arc::clone(worker);
        let rewritten = request.redirect_to(index);
        instructions.unshift(
            "routes",
            Box::new(move || task(async move { worker.fetch(&rewritten).await.map(Some) })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MemoryCacheStorage, MemoryOrigin, Method};
    use crate::cache::{CacheFacade, FetchFacade};
    use crate::log::Logger;
    use crate::plugins::StaticContentPlugin;
    use crate::task::parallel;
    use crate::worker::{factory, PluginFactory};

    const MANIFEST: &str = r#"{
        "groups": {"app": {"urls": {
            "/index.html": {"hash": "i1"},
            "/hello.txt": {"hash": "h1"}
        }}},
        "routing": {
            "index": "/hello.txt",
            "routes": {
                "/goodbye.txt": {},
                "/app/": {"prefix": true, "onlyWithoutExtension": true}
            }
        }
    }"#;

    fn plugin() -> RoutesPlugin {
        RoutesPlugin::new(&Manifest::parse(MANIFEST).unwrap())
    }

    #[test]
    fn rewrites_declared_routes() {
        let plugin = plugin();
        assert_eq!(plugin.rewrite(&Request::get("/goodbye.txt")).as_deref(), Some("/hello.txt"));
        assert_eq!(plugin.rewrite(&Request::get("/")).as_deref(), Some("/hello.txt"));
        assert_eq!(plugin.rewrite(&Request::get("/app/settings")).as_deref(), Some("/hello.txt"));
        assert_eq!(plugin.rewrite(&Request::get("/goodbye.txt?x=1")).as_deref(), Some("/hello.txt"));
    }

    #[test]
    fn leaves_other_requests_alone() {
        let plugin = plugin();
        assert!(plugin.rewrite(&Request::get("/hello.txt")).is_none());
        assert!(plugin.rewrite(&Request::get("/app/logo.png")).is_none());
        assert!(plugin.rewrite(&Request::get("/elsewhere")).is_none());
        assert!(plugin.rewrite(&Request::new(Method::Post, "/goodbye.txt")).is_none());
    }

    #[test]
    fn index_with_query_is_not_rewritten_again() {
        let manifest = Manifest::parse(
            r#"{"routing": {"index": "/index.html?v=2", "routes": {"/": {"prefix": true}}}}"#,
        )
        .unwrap();
        let plugin = RoutesPlugin::new(&manifest);

        let target = plugin.rewrite(&Request::get("/about")).unwrap();
        assert_eq!(target, "/index.html?v=2");
        assert!(plugin.rewrite(&Request::get(target.as_str())).is_none());
    }

    #[test]
    fn no_routing_no_rewrites() {
        let plugin = RoutesPlugin::new(&Manifest::parse("{}").unwrap());
        assert!(plugin.rewrite(&Request::get("/")).is_none());
    }

    #[tokio::test]
    async fn serves_index_content_without_network() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let origin = Arc::new(MemoryOrigin::new());
        origin.respond_text("/index.html", "index");
        origin.respond_text("/hello.txt", "hello");

        let factories: Vec<PluginFactory> = vec![
            factory(|m: &Manifest| Ok(StaticContentPlugin::new(m))),
            factory(|m: &Manifest| Ok(RoutesPlugin::new(m))),
        ];
        let worker = VersionWorker::new(
            Arc::new(Manifest::parse(MANIFEST).unwrap()),
            CacheFacade::new(storage),
            FetchFacade::new(origin.clone(), "bust"),
            &factories,
            Logger::new(10),
        )
        .unwrap();
        parallel(worker.setup()).await.unwrap();

        let response = worker.fetch(&Request::get("/goodbye.txt")).await.unwrap();
        assert_eq!(response.text(), "hello");
        assert_eq!(origin.hits("/goodbye.txt"), 0);
        assert_eq!(origin.hits("/hello.txt"), 1);
    }
}
