use bloggy::build::build_site;
use bloggy::config::Config;
use clap::{crate_version, App, Arg};
use log::LevelFilter;
use std::path::Path;

fn main() {
    let matches = App::new("bloggy")
        .version(crate_version!())
        .about("Builds a static site from a directory of dated Markdown posts")
        .arg(
            Arg::with_name("PROJECT_DIR")
                .help("The project root (or any directory below a `bloggy.yaml`)")
                .index(1)
                .default_value("."),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Increases logging verbosity (-v for debug, -vv for trace)"),
        )
        .get_matches();

    env_logger::Builder::new()
        .filter_level(match matches.occurrences_of("verbose") {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let project_dir = Path::new(matches.value_of("PROJECT_DIR").unwrap_or("."));

    let result = Config::from_directory(project_dir)
        .map_err(|err| Box::new(err) as Box<dyn std::error::Error>)
        .and_then(|config| build_site(&config).map_err(|err| err.into()));

    // Error messages already include their causes.
    if let Err(err) = result {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
