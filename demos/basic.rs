//! Minimal ware example: timing middleware, an auth check that can stop the
//! chain early, and a return handler that renders the action's result.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic

use std::sync::Arc;
use std::time::Instant;

use ware::{Buffer, Context, Dep, Error, Logger, ReturnHandler, Returned, Ware};

#[derive(Clone)]
struct User(&'static str);

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let mut app = Ware::new();
    app.bind_as::<dyn ReturnHandler>(Arc::new(render))
        .use_handler(timing)
        .use_handler(authenticate)
        .action(greet);

    for user in ["alice", "mallory"] {
        let ctx = app.create_context();
        ctx.bind(User(user));
        ctx.run()?;

        let body = ctx.take_out::<Buffer>().map(Buffer::into_string).unwrap_or_default();
        println!("{user}: {body}");
    }
    Ok(())
}

// Wraps everything after it and logs how long it took.
fn timing(c: Context, Dep(log): Dep<Logger>) -> Result<(), Error> {
    let start = Instant::now();
    c.next()?;
    log.info(&format!("chain took {:?}", start.elapsed()));
    Ok(())
}

// Writes a rejection and stops the chain for unknown users.
fn authenticate(c: Context, Dep(user): Dep<User>) {
    if user.0 == "mallory" {
        let mut buf = Buffer::default();
        buf.push("403 forbidden");
        c.out(buf);
    }
}

fn greet(Dep(user): Dep<User>) -> String {
    format!("hello, {}", user.0)
}

// Turns string results into the run's output.
fn render(ctx: &Context, value: Returned) -> Result<(), Error> {
    if let Ok(body) = value.downcast::<String>() {
        let mut buf = Buffer::default();
        buf.push(&body);
        ctx.out(buf);
    }
    Ok(())
}
