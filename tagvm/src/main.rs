extern crate clap;
extern crate tagvm;
extern crate tracing;

use std::process;

use clap::{App, Arg, ArgMatches};
use tracing::info;

use tagvm::logging::init_logging;
use tagvm::{Config, HeapSettings, Interpreter, RuntimeError, Value};

// Every `KEEP_EVERY`th churned tuple is kept alive
const KEEP_EVERY: usize = 10;

fn size_arg(matches: &ArgMatches, name: &str) -> Result<Option<usize>, String> {
    match matches.value_of(name) {
        Some(text) => text
            .parse::<usize>()
            .map(Some)
            .map_err(|_| format!("--{} expects a whole number, got '{}'", name, text)),
        None => Ok(None),
    }
}

fn config_from(matches: &ArgMatches) -> Result<Config, String> {
    let mut heap = match size_arg(matches, "young")? {
        Some(young) => HeapSettings::with_young_size(young),
        None => HeapSettings::default(),
    };
    if let Some(old) = size_arg(matches, "old")? {
        heap.old_size = old;
        heap.max_old_size = heap.max_old_size.max(old);
    }
    heap.validate()
        .map_err(|_| String::from("heap sizes must be powers of two of at least 4096 bytes"))?;

    Ok(Config {
        heap,
        inline_cache: !matches.is_present("no-inline-cache"),
        ..Config::default()
    })
}

/// Allocate `count` short tuples, keeping a fraction of them reachable, and
/// ask each kept tuple its length through one cached call site
fn churn(interp: &mut Interpreter, count: usize) -> Result<(), RuntimeError> {
    let kept = interp.tuple_empty()?;
    let kept = interp.pin(kept);
    let length = interp.intern("length")?;
    let length = interp.pin(length);

    for i in 0..count {
        let tuple = interp.tuple_from(&[Value::int(i as isize), Value::NIL])?;

        if i % KEEP_EVERY == 0 {
            interp.tuple_push(kept, tuple)?;
        }
    }

    for i in 0..interp.tuple_len(interp.value(kept))? {
        let item = interp.tuple_at(interp.value(kept), i)?;
        let message = interp.value(length);
        interp.send_cached(0, item, message, &[])?;
    }

    info!(
        target: "tagvm",
        allocated = count,
        kept = interp.tuple_len(interp.value(kept))?,
        "churn finished"
    );
    Ok(())
}

fn usage_error(err: String) -> ! {
    eprintln!("{}", err);
    process::exit(2);
}

fn run(matches: &ArgMatches) -> Result<(), RuntimeError> {
    let config = config_from(matches).unwrap_or_else(|err| usage_error(err));
    let count = size_arg(matches, "churn")
        .unwrap_or_else(|err| usage_error(err))
        .unwrap_or(0);

    let mut interp = Interpreter::new(config)?;

    if count > 0 {
        churn(&mut interp, count)?;
    }

    if matches.is_present("major") {
        interp.collect(0, true)?;
    }

    let stats = interp.gc_stats();
    let cache = interp.cache_stats();

    println!("types        {}", interp.type_count()?);
    println!("interned     {}", interp.interned_count());
    println!("gc fixed     {}", stats.fixed);
    println!("gc actual    {}", stats.actual);
    println!("gc reserved  {}", stats.reserved);
    println!("remembered   {}", stats.remembered);
    println!("collections  {} minor, {} major", stats.minors, stats.majors);
    println!("cache        {} hits, {} misses", cache.hits, cache.misses);

    Ok(())
}

fn app() -> App<'static, 'static> {
    App::new("tagvm-stats")
        .about("Exercise the runtime heap and print collector diagnostics")
        .arg(
            Arg::with_name("young")
                .long("young")
                .takes_value(true)
                .help("Young region size in bytes"),
        )
        .arg(
            Arg::with_name("old")
                .long("old")
                .takes_value(true)
                .help("Initial old region size in bytes"),
        )
        .arg(
            Arg::with_name("churn")
                .long("churn")
                .takes_value(true)
                .help("Number of tuples to allocate before reporting"),
        )
        .arg(
            Arg::with_name("no-inline-cache")
                .long("no-inline-cache")
                .help("Resolve every send through the vtables"),
        )
        .arg(
            Arg::with_name("major")
                .long("major")
                .help("Run a major collection before reporting"),
        )
}

fn main() {
    init_logging();

    let matches = app().get_matches();
    run(&matches).unwrap_or_else(|err| {
        eprintln!("Terminated: {}", err);
        process::exit(1);
    });
}
