use anyhow::Result;
use clap::{load_yaml, App};
use env_logger::Builder;
use jemallocator::Jemalloc;
use log::info;
use log::LevelFilter::*;
use wirespider::{report, run};

#[global_allocator]
static ALLOC: Jemalloc = Jemalloc;

fn main() -> Result<()> {
    let yaml = load_yaml!("args.yml");
    let ver  = env!("CARGO_PKG_VERSION");
    let args = App::from_yaml(&yaml).version(ver).get_matches();

    let (module, level) = match args.occurrences_of("verbose") {
        0 => (Some("wirespider"), Info),
        1 => (Some("wirespider"), Debug),
        2 => (Some("wirespider"), Trace),
        _ => (None,               Trace),
    };
    Builder::from_default_env().filter(module, level).init();

    info!("initializing wirespider {}", ver);

    match args.subcommand() {
        ("run",    Some(args)) => run::run(args),
        ("report", Some(args)) => report::report(args),
        _                      => Ok(()),
    }
}
