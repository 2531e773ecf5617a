use std::sync::Arc;

use director::dispatcher::{Handler, HandlerDefinition, Outcome};
use director::ids::HandlerId;
use director::prelude::*;

mod common;
use common::EventLog;

fn admin_controller(log: EventLog) -> std::sync::Arc<HandlerDefinition<Controller<()>>> {
    let team = common::team_handler();
    Controller::<()>::definition("AdminController")
        .url_handler("team//$Section", "team")
        .action("team", move |_c, _req, _cx| {
            log.push("admin.team");
            Ok(Handler::new(team.clone(), ()).into_outcome())
        })
        .allow("team")
        .build()
        .unwrap()
}

fn registry(log: &EventLog) -> ControllerRegistry {
    let mut registry = ControllerRegistry::new();
    registry.register_handler(common::team_handler(), || ());
    registry.register_controller(admin_controller(log.clone()), || ());
    registry
}

fn routes() -> RouteTable {
    RouteTable::new()
        .with("admin", "AdminController")
        .unwrap()
        .with("team", "TeamHandler")
        .unwrap()
}

#[test]
fn test_delegation_hands_remaining_path_to_child() {
    let log = EventLog::new();
    let app = common::app(routes(), registry(&log));

    let res = app.handle(HttpRequest::get("/admin/team/members/7"));
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "members id=7");
    assert_eq!(log.events(), vec!["admin.team"]);
}

#[test]
fn test_unconsumed_sub_url_is_404() {
    let log = EventLog::new();
    let app = common::app(routes(), registry(&log));

    let res = app.handle(HttpRequest::get("/team/members/7/extra"));
    assert_eq!(res.status, 404);
    assert_eq!(res.body, "I can't handle sub-URLs of a TeamHandler object.");
}

#[test]
fn test_unknown_and_reserved_actions() {
    let log = EventLog::new();
    let app = common::app(routes(), registry(&log));

    let res = app.handle(HttpRequest::get("/team/nope"));
    assert_eq!(res.status, 404);
    assert_eq!(res.body, "Action 'nope' isn't available on class TeamHandler.");

    let res = app.handle(HttpRequest::get("/team/init"));
    assert_eq!(res.status, 403);

    let res = app.handle(HttpRequest::get("/team/handle_request"));
    assert_eq!(res.status, 403);
}

#[test]
fn test_zero_segment_rule_does_not_recurse() {
    let log = EventLog::new();
    let inner_log = log.clone();
    let child = HandlerDefinition::<Handler<()>>::builder("ChildHandler")
        .action("index", move |_h, _req, _cx| {
            inner_log.push("child.index");
            Ok(Outcome::Body("child".into()))
        })
        .build()
        .unwrap();

    let outer_log = log.clone();
    let landing = HandlerDefinition::<Handler<()>>::builder("LandingHandler")
        .url_handler("", "index")
        .action("index", move |_h, _req, _cx| {
            outer_log.push("landing.index");
            Ok(Handler::new(child.clone(), ()).into_outcome())
        })
        .build()
        .unwrap();

    let mut registry = ControllerRegistry::new();
    registry.register_handler(landing, || ());
    let app = common::app(RouteTable::new().with("home", "LandingHandler").unwrap(), registry);

    let res = app.handle(HttpRequest::get("/home"));
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "");
    assert_eq!(log.events(), vec!["landing.index"]);
}

#[test]
fn test_action_returning_current_terminates() {
    let def = HandlerDefinition::<Handler<u32>>::builder("CounterHandler")
        .url_handler("bump", "bump")
        .action("bump", |h, _req, _cx| {
            h.state += 1;
            Ok(Outcome::Current)
        })
        .allow("bump")
        .build()
        .unwrap();

    let mut registry = ControllerRegistry::new();
    registry.register_handler(def, || 0);
    let app = common::app(RouteTable::new().with("counter", "CounterHandler").unwrap(), registry);

    let res = app.handle(HttpRequest::get("/counter/bump"));
    assert_eq!(res.status, 200);
}

#[test]
fn test_empty_rule_returning_itself_ends_dispatch() {
    let log = EventLog::new();
    let inner = log.clone();
    let def = HandlerDefinition::<Handler<u32>>::builder("SelfHandler")
        .url_handler("", "index")
        .action("index", move |h, _req, _cx| {
            h.state += 1;
            inner.push("self.index");
            Ok(Outcome::Current)
        })
        .build()
        .unwrap();

    let mut handler = Handler::new(def, 0);
    let mut req = HttpRequest::get("/");
    let mut cx = DispatchContext::new(Arc::new(ControllerRegistry::new()));

    let outcome = handler.handle_request(&mut req, &mut cx).unwrap();
    assert!(matches!(outcome, Outcome::Current));
    assert_eq!(handler.state, 1);
    assert_eq!(log.events(), vec!["self.index"]);
    assert_eq!(cx.depth(), 0);
}

/// Stands in for a handler instance under a second name.
struct Alias {
    id: HandlerId,
    log: EventLog,
}

impl RequestHandler for Alias {
    fn class_name(&self) -> &str {
        "Alias"
    }

    fn handler_id(&self) -> HandlerId {
        self.id
    }

    fn handle_request(
        &mut self,
        _req: &mut HttpRequest,
        _cx: &mut DispatchContext,
    ) -> DispatchResult<Outcome> {
        self.log.push("alias.dispatched");
        Ok(Outcome::Empty)
    }
}

#[test]
fn test_delegating_to_the_same_instance_does_not_recurse() {
    let log = EventLog::new();
    let (action_log, alias_log) = (log.clone(), log.clone());
    let def = HandlerDefinition::<Handler<()>>::builder("MirrorHandler")
        .url_handler("again", "again")
        .action("again", move |h, _req, _cx| {
            action_log.push("mirror.again");
            Ok(Outcome::Delegate(Box::new(Alias {
                id: h.id(),
                log: alias_log.clone(),
            })))
        })
        .build()
        .unwrap();

    let mut handler = Handler::new(def, ());
    let mut req = HttpRequest::get("/again");
    let mut cx = DispatchContext::new(Arc::new(ControllerRegistry::new()));

    let outcome = handler.handle_request(&mut req, &mut cx).unwrap();
    assert!(outcome.is_delegate());
    assert_eq!(log.events(), vec!["mirror.again"]);
}

#[test]
fn test_hyphenated_actions_and_index_default() {
    let def = HandlerDefinition::<Handler<()>>::builder("ExportHandler")
        .action("index", |_h, _req, _cx| Ok(Outcome::Body("overview".into())))
        .action("export_csv", |_h, _req, _cx| Ok(Outcome::Body("csv".into())))
        .allow("export_csv")
        .build()
        .unwrap();

    let mut registry = ControllerRegistry::new();
    registry.register_handler(def, || ());
    let app = common::app(RouteTable::new().with("export", "ExportHandler").unwrap(), registry);

    assert_eq!(app.handle(HttpRequest::get("/export/export-csv")).body, "csv");
    assert_eq!(app.handle(HttpRequest::get("/export")).body, "overview");
}

#[test]
fn test_before_and_after_hooks() {
    let def = HandlerDefinition::<Handler<()>>::builder("GuardedHandler")
        .action("open", |_h, _req, _cx| Ok(Outcome::Body("open".into())))
        .action("closed", |_h, _req, _cx| Ok(Outcome::Body("never".into())))
        .allow("open")
        .allow("closed")
        .before_action(|_h, _req, _cx, action| {
            Ok((action == "closed").then(|| Outcome::Body("maintenance".into())))
        })
        .after_action(|_h, _req, _cx, _action, result| {
            Ok(match result {
                Outcome::Body(body) => Some(Outcome::Body(format!("[{body}]"))),
                _ => None,
            })
        })
        .build()
        .unwrap();

    let mut registry = ControllerRegistry::new();
    registry.register_handler(def, || ());
    let app = common::app(RouteTable::new().with("guarded", "GuardedHandler").unwrap(), registry);

    assert_eq!(app.handle(HttpRequest::get("/guarded/open")).body, "[open]");
    assert_eq!(app.handle(HttpRequest::get("/guarded/closed")).body, "maintenance");
}

#[test]
fn test_signals_raised_by_actions_become_responses() {
    let def = HandlerDefinition::<Handler<()>>::builder("SignalHandler")
        .action("gone", |_h, _req, _cx| Err(http_error(410, "Gone for good")))
        .action("away", |_h, _req, _cx| Err(redirect("/elsewhere", None)))
        .allow("gone")
        .allow("away")
        .build()
        .unwrap();

    let mut registry = ControllerRegistry::new();
    registry.register_handler(def, || ());
    let app = common::app(RouteTable::new().with("signal", "SignalHandler").unwrap(), registry);

    let res = app.handle(HttpRequest::get("/signal/gone"));
    assert_eq!((res.status, res.body.as_str()), (410, "Gone for good"));

    let res = app.handle(HttpRequest::get("/signal/away"));
    assert_eq!(res.status, 302);
    assert_eq!(res.location(), Some("/elsewhere"));
}

fn looping_registry() -> ControllerRegistry {
    // `$Next` is optional, so the rule keeps matching an exhausted path.
    let def = HandlerDefinition::<Handler<()>>::builder("LoopHandler")
        .url_handler("$Next", "again")
        .action("again", |_h, _req, cx| {
            let next = cx
                .registry()
                .create("LoopHandler")
                .ok_or_else(|| anyhow::anyhow!("LoopHandler missing"))?;
            Ok(Outcome::Delegate(next))
        })
        .allow("again")
        .build()
        .unwrap();
    let mut registry = ControllerRegistry::new();
    registry.register_handler(def, || ());
    registry
}

#[test]
fn test_runaway_delegation_is_bounded() {
    let routes = RouteTable::new().with("loop", "LoopHandler").unwrap();

    let lenient = HttpApplication::new(routes.clone(), looping_registry())
        .with_config(common::lenient().max_depth(8));
    let res = lenient.handle(HttpRequest::get("/loop"));
    assert_eq!(res.status, 404);

    let strict = HttpApplication::new(routes, looping_registry())
        .with_config(common::strict().max_depth(8));
    let res = strict.handle(HttpRequest::get("/loop"));
    assert_eq!(res.status, 500);
}

#[test]
fn test_all_params_accumulate_across_levels() {
    let def = HandlerDefinition::<Handler<()>>::builder("EchoHandler")
        .url_handler("$Action!//$ID", "$Action")
        .action("show", |_h, req, _cx| {
            Ok(Outcome::Body(format!(
                "lang={} id={}",
                req.all_params().get("Lang").unwrap_or("-"),
                req.all_params().get("ID").unwrap_or("-"),
            )))
        })
        .allow("show")
        .build()
        .unwrap();
    let mut registry = ControllerRegistry::new();
    registry.register_handler(def, || ());
    let app = common::app(
        RouteTable::new().with("$Lang/echo", "EchoHandler").unwrap(),
        registry,
    );

    let res = app.handle(HttpRequest::get("/de/echo/show/3"));
    assert_eq!(res.body, "lang=de id=3");
}
