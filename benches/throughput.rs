use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use director::config::{parse_config, ConfigFormat};
use director::dispatcher::{Handler, HandlerDefinition, Outcome};
use director::prelude::*;
use director::runtime_config::RuntimeConfig;

fn example_routes() -> &'static str {
    r#"
rules:
  - pattern: "zoo/health"
    target: ZooHandler
  - pattern: "zoo/animals//$Action/$ID"
    target: ZooHandler
  - pattern: "zoo/$Category/animals//$Action/$ID/$OtherID"
    target: ZooHandler
  - pattern: "inventory/$Warehouse/feeds/$Feed/items/$Item//$Action"
    target: ZooHandler
  - pattern: "POST api//$Action"
    target: ZooHandler
  - pattern: "old-zoo/$Slug"
    target: "->zoo/$Slug"
  - pattern: "$Controller//$Action/$ID"
    target:
      Controller: "$Controller"
"#
}

fn registry() -> ControllerRegistry {
    let zoo = HandlerDefinition::<Handler<()>>::builder("ZooHandler")
        .url_handler("$Action//$ID/$OtherID", "$Action")
        .action("index", |_h, _req, _cx| Ok(Outcome::Body("zoo".into())))
        .action("show", |_h, req, _cx| {
            Ok(Outcome::Body(req.param("ID").unwrap_or_default().to_string()))
        })
        .allow("show")
        .build()
        .expect("valid definition");
    let mut registry = ControllerRegistry::new();
    registry.register_handler(zoo, || ());
    registry
}

fn routes() -> RouteTable {
    let config = parse_config(example_routes(), ConfigFormat::Yaml).expect("valid routes");
    RouteTable::from_config(&config).expect("valid route table")
}

fn paths() -> [(Method, &'static str); 6] {
    [
        (Method::GET, "/zoo/animals/show/123"),
        (Method::GET, "/zoo/cats/animals/show/123/88"),
        (Method::GET, "/inventory/1/feeds/2/items/3/show"),
        (Method::POST, "/api/show"),
        (Method::GET, "/old-zoo/penguins"),
        (Method::GET, "/zoohandler/show/9"),
    ]
}

fn bench_route_resolution(c: &mut Criterion) {
    let routes = routes();
    let registry = registry();
    let paths = paths();
    c.bench_function("route_resolve", |b| {
        b.iter(|| {
            for (method, path) in paths.iter() {
                let mut req = HttpRequest::new(method.clone(), path);
                let res = routes.resolve(&mut req, &registry, None);
                black_box(&res);
            }
        })
    });
}

fn bench_full_dispatch(c: &mut Criterion) {
    let app = HttpApplication::new(routes(), registry()).with_config(RuntimeConfig::default());
    let paths = paths();
    c.bench_function("full_dispatch", |b| {
        b.iter(|| {
            for (method, path) in paths.iter() {
                let res = app.handle(HttpRequest::new(method.clone(), path));
                black_box(&res);
            }
        })
    });
}

criterion_group!(benches, bench_route_resolution, bench_full_dispatch);
criterion_main!(benches);
