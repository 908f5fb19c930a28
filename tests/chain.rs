use std::sync::Arc;

use parking_lot::Mutex;
use ware::{Buffer, Context, Dep, Error, Logger, Output, Returned, ReturnHandler, Value, Ware, handler};

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

/// Records `name` and continues without calling `next()`.
fn step(log: &Log, name: &'static str) -> impl Fn() + Send + Sync + use<> {
    let log = Arc::clone(log);
    move || log.lock().push(name.to_owned())
}

/// Records `name` before and `name` + "-after" after the rest of the chain.
fn wrap(log: &Log, name: &'static str) -> impl Fn(Context) -> Result<(), Error> + Send + Sync + use<> {
    let log = Arc::clone(log);
    move |c: Context| -> Result<(), Error> {
        log.lock().push(name.to_owned());
        c.next()?;
        log.lock().push(format!("{name}-after"));
        Ok(())
    }
}

/// An output that is written from the moment it is set.
struct Done;

impl Output for Done {
    fn written(&self) -> bool {
        true
    }
}

// ── Ordering ────────────────────────────────────────────────────────────────

#[test]
fn onion_ordering() {
    let log = log();
    let mut w = Ware::new();
    w.use_handler(wrap(&log, "h1"));
    w.use_handler(wrap(&log, "h2"));
    w.action(step(&log, "action"));

    w.run().unwrap();
    assert_eq!(entries(&log), ["h1", "h2", "action", "h2-after", "h1-after"]);
}

#[test]
fn accumulates_foobarbatbazban() {
    let result = Arc::new(Mutex::new(String::new()));
    let mut w = Ware::new();

    let r = Arc::clone(&result);
    w.use_handler(move |c: Context| -> Result<(), Error> {
        r.lock().push_str("foo");
        c.next()?;
        r.lock().push_str("ban");
        Ok(())
    });
    let r = Arc::clone(&result);
    w.use_handler(move |c: Context| -> Result<(), Error> {
        r.lock().push_str("bar");
        c.next()?;
        r.lock().push_str("baz");
        Ok(())
    });
    let r = Arc::clone(&result);
    w.action(move || r.lock().push_str("bat"));

    w.run().unwrap();
    assert_eq!(*result.lock(), "foobarbatbazban");
}

#[test]
fn handlers_without_next_run_in_sequence() {
    let log = log();
    let mut w = Ware::new();
    w.use_handler(step(&log, "a"));
    w.use_handler(step(&log, "b"));
    w.action(step(&log, "action"));

    w.run().unwrap();
    assert_eq!(entries(&log), ["a", "b", "action"]);
}

#[test]
fn handlers_replace_the_stack() {
    let log = log();
    let mut w = Ware::new();
    w.use_handler(wrap(&log, "foo"));

    let batman = {
        let log = Arc::clone(&log);
        move |_: Context| log.lock().push("batman!".to_owned())
    };
    w.handlers([handler(batman.clone()), handler(batman.clone()), handler(batman)]);
    w.action(step(&log, "bat"));

    w.run().unwrap();
    assert_eq!(entries(&log).concat(), "batman!batman!batman!bat");
}

#[test]
fn default_action_is_a_no_op() {
    let log = log();
    let mut w = Ware::new();
    w.use_handler(wrap(&log, "only"));

    w.run().unwrap();
    assert_eq!(entries(&log), ["only", "only-after"]);
}

// ── Early stop ──────────────────────────────────────────────────────────────

#[test]
fn stops_after_the_handler_that_wrote() {
    const LEN: usize = 4;

    for writer in 0..=LEN {
        let ran = Arc::new(Mutex::new(0usize));
        let mut w = Ware::new();
        for i in 0..LEN {
            let ran = Arc::clone(&ran);
            w.use_handler(move |c: Context| {
                *ran.lock() += 1;
                if i == writer {
                    c.out(Done);
                }
            });
        }
        let r = Arc::clone(&ran);
        w.action(move || *r.lock() += 1);

        w.run().unwrap();
        // writer == LEN never writes: every handler plus the action runs.
        assert_eq!(*ran.lock(), writer + 1, "writer at {writer}");
    }
}

#[test]
fn early_stop_unwinds_wrapping_handlers() {
    let log = log();
    let mut w = Ware::new();
    w.use_handler(wrap(&log, "outer"));
    let l = Arc::clone(&log);
    w.use_handler(move |c: Context| {
        l.lock().push("writer".to_owned());
        c.out(Done);
    });
    w.use_handler(step(&log, "skipped"));
    w.action(step(&log, "action"));

    w.run().unwrap();
    assert_eq!(entries(&log), ["outer", "writer", "outer-after"]);
}

#[test]
fn output_without_written_check_never_stops() {
    let log = log();
    let mut w = Ware::new();
    w.use_handler(|c: Context| c.out(String::from("not a finalizer")));
    w.action(step(&log, "action"));

    w.run().unwrap();
    assert_eq!(entries(&log), ["action"]);
}

#[test]
fn buffer_stops_once_filled() {
    let log = log();
    let mut w = Ware::new();
    w.use_handler(|c: Context| c.out(Buffer::default()));
    w.use_handler(step(&log, "still running"));
    w.use_handler(|c: Context| {
        c.with_out(|b: &mut Buffer| b.push("done"));
    });
    w.action(step(&log, "action"));

    let ctx = w.create_context();
    ctx.run().unwrap();
    assert_eq!(entries(&log), ["still running"]);
    assert_eq!(ctx.take_out::<Buffer>().unwrap().as_str(), "done");
}

// ── Injection ───────────────────────────────────────────────────────────────

#[test]
fn missing_binding_aborts_the_run() {
    let log = log();
    let mut w = Ware::new();
    w.use_handler(step(&log, "first"));
    w.use_handler(|_: Dep<std::time::Duration>| {});
    w.action(step(&log, "action"));

    let err = w.run().unwrap_err();
    assert!(matches!(err, Error::MissingBinding { type_name } if type_name.contains("Duration")));
    assert_eq!(entries(&log), ["first"]);
}

#[test]
fn logger_prefix_is_shared_between_handlers() {
    let prefix = Arc::new(Mutex::new(String::new()));
    let mut w = Ware::new();
    w.use_handler(|Dep(log): Dep<Logger>| log.set_prefix("[api]"));
    let p = Arc::clone(&prefix);
    w.use_handler(move |Dep(log): Dep<Logger>| *p.lock() = log.prefix());

    w.run().unwrap();
    assert_eq!(*prefix.lock(), "[api]");
}

#[test]
fn handlers_receive_the_bound_instance() {
    let logger = Logger::new("[app]");
    let mut w = Ware::new();
    w.bind(logger.clone());
    w.action(|Dep(log): Dep<Logger>| {
        log.info("from the action");
        log.set_prefix("[changed]");
    });

    w.run().unwrap();
    assert_eq!(logger.prefix(), "[changed]");
}

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

struct English;

impl Greeter for English {
    fn greet(&self, name: &str) -> String {
        format!("hello {name}")
    }
}

#[test]
fn interface_bindings_resolve_as_trait_objects() {
    let greeting = Arc::new(Mutex::new(String::new()));
    let mut w = Ware::new();
    w.bind_as::<dyn Greeter>(Arc::new(English));
    let g = Arc::clone(&greeting);
    w.action(move |Dep(greeter): Dep<Arc<dyn Greeter>>| *g.lock() = greeter.greet("ware"));

    w.run().unwrap();
    assert_eq!(*greeting.lock(), "hello ware");
}

#[derive(Clone, Debug, PartialEq)]
struct RequestId(u64);

#[test]
fn run_bindings_reach_later_handlers_only_in_that_run() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut w = Ware::new();
    w.use_handler(|c: Context| c.bind(RequestId(7)));
    let s = Arc::clone(&seen);
    w.action(move |Dep(id): Dep<RequestId>| s.lock().push(id));

    w.run().unwrap();
    w.run().unwrap();
    assert_eq!(*seen.lock(), [RequestId(7), RequestId(7)]);
    assert!(!w.registry().contains::<RequestId>());
}

#[test]
fn optional_dependencies() {
    let seen = Arc::new(Mutex::new(None));
    let mut w = Ware::new();
    let s = Arc::clone(&seen);
    w.action(move |id: Option<Dep<RequestId>>, Dep(log): Dep<Logger>| {
        *s.lock() = Some((id.is_none(), log.prefix()));
    });

    w.run().unwrap();
    assert_eq!(*seen.lock(), Some((true, "[ware]".to_owned())));
}

// ── Contexts ────────────────────────────────────────────────────────────────

#[test]
fn contexts_are_independent() {
    let mut w = Ware::new();
    w.use_handler(|| {});
    let a = w.create_context();
    let b = w.create_context();

    a.out(Done);
    a.bind(RequestId(1));
    assert!(a.written());
    assert!(!b.written());
    assert!(b.get::<RequestId>().is_none());

    b.run().unwrap();
    assert_eq!(b.cursor(), 2);
    assert_eq!(a.cursor(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_do_not_interfere() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut w = Ware::new();
    w.use_handler(|c: Context, Dep(n): Dep<u64>| c.bind(RequestId(n)));
    w.use_handler(|| std::thread::yield_now());
    let s = Arc::clone(&seen);
    w.action(move |c: Context, Dep(id): Dep<RequestId>| s.lock().push((c.cursor(), id.0)));
    let w = Arc::new(w);

    let mut tasks = tokio::task::JoinSet::new();
    for n in 0..16u64 {
        let w = Arc::clone(&w);
        tasks.spawn_blocking(move || {
            let ctx = w.create_context();
            ctx.bind(n);
            ctx.run()
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap().unwrap();
    }

    let mut seen = seen.lock().clone();
    seen.sort();
    assert_eq!(seen, (0..16).map(|n| (2, n)).collect::<Vec<_>>());
}

// ── Return values ───────────────────────────────────────────────────────────

fn collect_strings(log: &Log) -> Arc<dyn ReturnHandler> {
    let log = Arc::clone(log);
    Arc::new(move |_: &Context, value: Returned| -> Result<(), Error> {
        if let Some(s) = value.downcast_ref::<&str>() {
            log.lock().push((*s).to_owned());
        } else if let Some(s) = value.downcast_ref::<String>() {
            log.lock().push(s.clone());
        }
        Ok(())
    })
}

#[test]
fn returned_values_reach_the_return_handler() {
    let log = log();
    let mut w = Ware::new();
    w.bind(collect_strings(&log));
    w.use_handler(|| "static");
    w.use_handler(|| {});
    w.use_handler(|| Value(5u8));
    w.action(|| -> Result<String, Error> { Ok("owned".to_owned()) });

    w.run().unwrap();
    assert_eq!(entries(&log), ["static", "owned"]);
}

#[test]
fn default_return_handler_discards() {
    let mut w = Ware::new();
    w.use_handler(|| "dropped");
    w.action(|| Value(vec![1, 2, 3]));
    w.run().unwrap();
}

#[test]
fn run_scoped_return_handler_overrides_global() {
    let global = log();
    let local = log();
    let mut w = Ware::new();
    w.bind(collect_strings(&global));
    w.use_handler(|| "before override");
    let l = Arc::clone(&local);
    w.use_handler(move |c: Context| c.bind(collect_strings(&l)));
    w.action(|| "after override");

    w.run().unwrap();
    assert_eq!(entries(&global), ["before override"]);
    assert_eq!(entries(&local), ["after override"]);
}

#[test]
fn return_handler_can_finish_the_output() {
    let log = log();
    let mut w = Ware::new();
    w.bind_as::<dyn ReturnHandler>(Arc::new(|ctx: &Context, value: Returned| -> Result<(), Error> {
        if let Ok(body) = value.downcast::<String>() {
            let mut buf = Buffer::default();
            buf.push(&body);
            ctx.out(buf);
        }
        Ok(())
    }));
    w.use_handler(|| String::from("rendered"));
    w.action(step(&log, "action"));

    let ctx = w.create_context();
    ctx.run().unwrap();
    assert!(entries(&log).is_empty());
    assert_eq!(ctx.take_out::<Buffer>().unwrap().into_string(), "rendered");
}

// ── Failure ─────────────────────────────────────────────────────────────────

#[test]
fn handler_error_aborts_the_run() {
    let log = log();
    let mut w = Ware::new();
    w.use_handler(|| -> Result<(), &'static str> { Err("boom") });
    w.action(step(&log, "action"));

    let err = w.run().unwrap_err();
    assert!(matches!(err, Error::Handler(_)));
    assert_eq!(err.to_string(), "handler failed: boom");
    assert!(entries(&log).is_empty());
}

#[test]
fn propagated_failure_keeps_the_original_error() {
    let log = log();
    let mut w = Ware::new();
    w.use_handler(wrap(&log, "outer"));
    w.use_handler(|_: Dep<RequestId>| {});
    w.action(step(&log, "action"));

    let err = w.run().unwrap_err();
    assert!(matches!(err, Error::MissingBinding { .. }));
    // `?` on next() returned early, so no "-after" entry.
    assert_eq!(entries(&log), ["outer"]);
}

#[test]
fn swallowed_failure_still_aborts() {
    let log = log();
    let mut w = Ware::new();
    let l = Arc::clone(&log);
    w.use_handler(move |c: Context| {
        let res = c.next();
        l.lock().push(format!("swallowed: {}", res.is_err()));
    });
    w.use_handler(|| -> Result<(), std::io::Error> { Err(std::io::Error::other("disk")) });
    w.use_handler(step(&log, "skipped"));
    w.action(step(&log, "action"));

    let err = w.run().unwrap_err();
    assert_eq!(err.to_string(), "handler failed: disk");
    assert_eq!(entries(&log), ["swallowed: true"]);
}

#[test]
fn next_after_failure_does_not_resume_the_chain() {
    let log = log();
    let mut w = Ware::new();
    w.use_handler(|c: Context| {
        let _ = c.next();
        let _ = c.next();
    });
    w.use_handler(|| -> Result<(), &'static str> { Err("boom") });
    w.action(step(&log, "action"));

    let err = w.run().unwrap_err();
    assert_eq!(err.to_string(), "handler failed: boom");
    assert!(entries(&log).is_empty());
}

#[test]
fn values_returned_after_failure_are_dropped() {
    let log = log();
    let mut w = Ware::new();
    w.bind(collect_strings(&log));
    w.use_handler(|c: Context| {
        let _ = c.next();
        "after failure"
    });
    w.use_handler(|| -> Result<(), &'static str> { Err("boom") });

    let err = w.run().unwrap_err();
    assert_eq!(err.to_string(), "handler failed: boom");
    assert!(entries(&log).is_empty());
}

#[test]
fn next_reports_aborted_to_waiting_handlers() {
    let seen = Arc::new(Mutex::new(None));
    let mut w = Ware::new();
    let s = Arc::clone(&seen);
    w.use_handler(move |c: Context| -> Result<(), Error> {
        let res = c.next();
        *s.lock() = Some(matches!(res, Err(Error::Aborted)));
        res
    });
    w.action(|| -> Result<(), &'static str> { Err("late") });

    let err = w.run().unwrap_err();
    assert_eq!(err.to_string(), "handler failed: late");
    assert_eq!(*seen.lock(), Some(true));
}
