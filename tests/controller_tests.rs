use std::sync::Arc;

use director::dispatcher::Outcome;
use director::prelude::*;
use director::render::{RenderContext, TemplateRenderer};

mod common;
use common::EventLog;

fn single(def: Arc<HandlerDefinition<Controller<()>>>, route: &str) -> HttpApplication {
    let mut registry = ControllerRegistry::new();
    let name = def.name().to_string();
    registry.register_controller(def, || ());
    common::app(RouteTable::new().with(route, &name).unwrap(), registry)
}

#[test]
fn test_init_chain_runs_most_derived_first() {
    let log = EventLog::new();
    let (base_log, report_log, action_log) = (log.clone(), log.clone(), log.clone());
    let def = Controller::<()>::definition("BaseAdmin")
        .init(move |c, req, cx| {
            base_log.push("base.init");
            c.init_parent(req, cx)
        })
        .class("ReportAdmin")
        .init(move |c, req, cx| {
            report_log.push("report.init");
            c.init_parent(req, cx)
        })
        .action("index", move |_c, _req, _cx| {
            action_log.push("report.index");
            Ok(Outcome::Body("reports".into()))
        })
        .build()
        .unwrap();
    let app = single(def, "reports");

    let res = app.handle(HttpRequest::get("/reports"));
    assert_eq!(res.body, "reports");
    assert_eq!(log.events(), vec!["report.init", "base.init", "report.index"]);
}

fn unchained_init() -> Arc<HandlerDefinition<Controller<()>>> {
    Controller::<()>::definition("ForgetfulController")
        .init(|_c, _req, _cx| Ok(()))
        .action("index", |_c, _req, _cx| Ok(Outcome::Body("ran".into())))
        .build()
        .unwrap()
}

#[test]
fn test_init_that_skips_its_parent_is_a_fault_when_strict() {
    let res = single(unchained_init(), "f").handle(HttpRequest::get("/f"));
    assert_eq!(res.status, 500);
}

#[test]
fn test_init_that_skips_its_parent_is_logged_when_lenient() {
    let app = single(unchained_init(), "f").with_config(common::lenient());
    let res = app.handle(HttpRequest::get("/f"));
    assert_eq!((res.status, res.body.as_str()), (200, "ran"));
}

#[test]
fn test_redirect_during_init_skips_the_action() {
    let log = EventLog::new();
    let action_log = log.clone();
    let def = Controller::<()>::definition("SecureController")
        .init(|c, req, cx| {
            if req.get_var("token").is_none() {
                c.redirect("/login", None);
            }
            c.init_parent(req, cx)
        })
        .action("index", move |_c, _req, _cx| {
            action_log.push("index");
            Ok(Outcome::Body("secret".into()))
        })
        .build()
        .unwrap();
    let app = single(def, "secure");

    let res = app.handle(HttpRequest::get("/secure"));
    assert_eq!(res.status, 302);
    assert_eq!(res.location(), Some("/login"));
    assert!(log.events().is_empty());

    assert_eq!(app.handle(HttpRequest::get("/secure?token=1")).body, "secret");
}

#[test]
fn test_signal_raised_in_init_becomes_the_response() {
    let def = Controller::<()>::definition("MovedController")
        .init(|_c, _req, _cx| Err(redirect("/signin", Some(303))))
        .build()
        .unwrap();
    let res = single(def, "moved").handle(HttpRequest::get("/moved"));
    assert_eq!(res.status, 303);
    assert_eq!(res.location(), Some("/signin"));
}

#[test]
fn test_controller_stack_tracks_nesting() {
    let log = EventLog::new();
    let inner_log = log.clone();
    let inner = Controller::<()>::definition("InnerController")
        .action("index", move |_c, _req, cx| {
            let current = cx.stack().current().map(|f| f.class.clone()).unwrap_or_default();
            inner_log.push(format!("depth={} current={current}", cx.stack().len()));
            Ok(Outcome::Body("inner".into()))
        })
        .build()
        .unwrap();
    let outer = Controller::<()>::definition("OuterController")
        .url_handler("inner", "inner")
        .action("inner", move |_c, _req, _cx| {
            Ok(Outcome::Delegate(Box::new(Controller::new(inner.clone(), ()))))
        })
        .allow("inner")
        .build()
        .unwrap();
    let app = single(outer, "outer");

    let mut req = HttpRequest::get("/outer/inner");
    let mut cx = app.context();
    let res = app.handle_with_context(&mut req, &mut cx);
    assert_eq!(res.body, "inner");
    assert_eq!(log.events(), vec!["depth=2 current=InnerController"]);
    assert!(cx.stack().is_empty());
}

fn page_controller() -> Arc<HandlerDefinition<Controller<()>>> {
    Controller::<()>::definition("PageController")
        .action("index", |_c, _req, _cx| {
            let mut data = RenderContext::new();
            data.insert("Title".into(), "Home".into());
            Ok(Outcome::Context(data))
        })
        .allow("show")
        .build()
        .unwrap()
}

fn renderer() -> Arc<TemplateRenderer> {
    let renderer = TemplateRenderer::new()
        .with_template("PageController", "<h1>{{ Title }}</h1>")
        .and_then(|r| {
            r.with_template(
                "PageController_show",
                "{{ ClassName }}:{{ Action }}:{{ URLParams.ID }}",
            )
        })
        .and_then(|r| r.with_template("PageController_print", "printable"))
        .unwrap();
    Arc::new(renderer)
}

#[test]
fn test_render_data_fills_the_class_template() {
    let app = single(page_controller(), "page").with_renderer(renderer());
    let res = app.handle(HttpRequest::get("/page"));
    assert_eq!(res.body, "<h1>Home</h1>");
}

#[test]
fn test_template_only_actions_render_when_allowed() {
    let app = single(page_controller(), "page").with_renderer(renderer());

    let res = app.handle(HttpRequest::get("/page/show/5"));
    assert_eq!((res.status, res.body.as_str()), (200, "PageController:show:5"));

    // template exists but the action is not on the allow-list
    assert_eq!(app.handle(HttpRequest::get("/page/print")).status, 403);
}

#[test]
fn test_render_data_without_templates_is_served_as_json() {
    let res = single(page_controller(), "page").handle(HttpRequest::get("/page"));
    assert_eq!(res.header("content-type"), Some("application/json"));
    let json: serde_json::Value = serde_json::from_str(&res.body).unwrap();
    assert_eq!(json["Title"], "Home");
    assert_eq!(json["ClassName"], "PageController");
}

#[test]
fn test_redirect_back_prefers_local_back_url() {
    let def = Controller::<()>::definition("FormController")
        .action("save", |c, req, cx| Ok(c.redirect_back(req, cx)))
        .allow("save")
        .build()
        .unwrap();
    let app = single(def.clone(), "form");

    let res = app.handle(HttpRequest::get("/form/save?BackURL=/admin/pages"));
    assert_eq!(res.location(), Some("/admin/pages"));

    let req = HttpRequest::get("/form/save?BackURL=https://evil.example/").with_header("referer", "/from");
    assert_eq!(app.handle(req).location(), Some("/from"));

    assert_eq!(app.handle(HttpRequest::get("/form/save")).location(), Some("/"));

    // off-site referrers are never followed
    let req = HttpRequest::get("/form/save").with_header("referer", "https://evil.example/phish");
    assert_eq!(app.handle(req).location(), Some("/"));
    let req = HttpRequest::get("/form/save").with_header("referer", "//evil.example/phish");
    assert_eq!(app.handle(req).location(), Some("/"));

    // absolute URLs on the site's own base URL are
    let app = single(def, "form").with_config(common::strict().base_url("https://example.com/"));
    let req = HttpRequest::get("/form/save").with_header("referer", "https://example.com/admin/pages");
    assert_eq!(app.handle(req).location(), Some("https://example.com/admin/pages"));
    let req = HttpRequest::get("/form/save").with_header("referer", "https://example.com.evil.example/");
    assert_eq!(app.handle(req).location(), Some("/"));
}
