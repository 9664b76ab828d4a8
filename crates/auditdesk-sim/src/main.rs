use anyhow::{bail, Context};
use auditdesk_core::prelude::*;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use simulate::{run_simulation, with_retries, SimulationConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod simulate;

fn cli() -> Command {
    let config = Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("TOML desk configuration");
    let seed = Arg::new("seed")
        .long("seed")
        .value_parser(value_parser!(u64))
        .help("Random seed for reproducibility");
    let fault_rate = Arg::new("fault-rate")
        .long("fault-rate")
        .value_parser(value_parser!(f64))
        .help("Probability of a simulated fault per call");
    let json = Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON");

    Command::new("auditdesk")
        .version(auditdesk_core::VERSION)
        .about("Simulated audit desk: seed, query and run audits")
        .subcommand_required(true)
        .args([config, seed, fault_rate, json])
        .subcommand(
            Command::new("simulate")
                .about("Create audits, run them and verify the progress invariants")
                .arg(
                    Arg::new("audits")
                        .long("audits")
                        .default_value("5")
                        .value_parser(value_parser!(usize))
                        .help("Number of audits to create and run"),
                )
                .arg(
                    Arg::new("template")
                        .long("template")
                        .default_value("tpl_5")
                        .help("Template id for created audits"),
                )
                .arg(
                    Arg::new("instant")
                        .long("instant")
                        .action(ArgAction::SetTrue)
                        .help("Drop every latency and engine delay"),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List seeded audits")
                .arg(Arg::new("query").long("query").help("Substring of name or process"))
                .arg(
                    Arg::new("status")
                        .long("status")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(AuditStatus))
                        .help("Status filter, repeatable"),
                )
                .arg(Arg::new("process").long("process").help("Process filter"))
                .arg(Arg::new("owner").long("owner").help("Owner id filter"))
                .arg(
                    Arg::new("sort")
                        .long("sort")
                        .default_value("updatedAt_desc")
                        .help("<field>_<asc|desc>"),
                )
                .arg(
                    Arg::new("page")
                        .long("page")
                        .default_value("1")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("page-size")
                        .long("page-size")
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(Command::new("templates").about("List the template catalog"))
        .subcommand(
            Command::new("show")
                .about("Show one audit with its checks")
                .arg(Arg::new("audit-id").required(true)),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<DeskConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => DeskConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DeskConfig::new(),
    };
    if let Some(seed) = matches.get_one::<u64>("seed") {
        config = config.with_rng_seed(*seed);
    }
    if let Some(rate) = matches.get_one::<f64>("fault-rate") {
        config = config.with_fault_rate(*rate);
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn list_filters(args: &ArgMatches) -> AuditFilters {
    let mut filters = AuditFilters::new().with_statuses(
        args.get_many::<AuditStatus>("status")
            .into_iter()
            .flatten()
            .copied(),
    );
    if let Some(query) = args.get_one::<String>("query") {
        filters = filters.with_query(query);
    }
    if let Some(process) = args.get_one::<String>("process") {
        filters = filters.with_process(process);
    }
    if let Some(owner) = args.get_one::<String>("owner") {
        filters = filters.with_owner(owner.as_str());
    }
    if let Some(sort) = args.get_one::<String>("sort") {
        let sort: SortSpec = sort.parse().unwrap_or_default();
        filters = filters.with_sort(sort);
    }
    filters.page = args.get_one::<usize>("page").copied();
    filters.page_size = args.get_one::<usize>("page-size").copied();
    filters
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let mut config = load_config(&matches)?;
    let json = matches.get_flag("json");

    match matches.subcommand() {
        Some(("simulate", args)) => {
            if args.get_flag("instant") {
                let mut instant = DeskConfig::instant().with_fault_rate(config.fault_rate);
                instant.rng_seed = config.rng_seed;
                instant.engine.ko_probability = config.engine.ko_probability;
                config = instant;
            }
            let sim = SimulationConfig {
                audits: args.get_one::<usize>("audits").copied().unwrap_or(5),
                template_id: args
                    .get_one::<String>("template")
                    .map_or_else(|| TemplateId::from("tpl_5"), |t| TemplateId::from(t.as_str())),
            };

            let desk = AuditDesk::empty(config)?;
            let report = run_simulation(&desk, &sim).await;
            desk.shutdown();

            if json {
                print_json(&report)?;
            } else {
                println!("{}", report.generate_text());
            }
            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("list", args)) => {
            let desk = AuditDesk::seeded(config)?;
            let filters = list_filters(args);
            let (page, _) = with_retries(|| desk.list_audits(&filters)).await;
            let page = page?;

            if json {
                print_json(&page)?;
            } else {
                println!("{} audits, page {} (size {})", page.total, page.page, page.page_size);
                for audit in &page.items {
                    println!(
                        "{:<10} {:<11} {:>3}%  {:<40} {:<12} {}",
                        audit.id, audit.status, audit.progress, audit.name, audit.process, audit.owner.name
                    );
                }
            }
        }
        Some(("templates", _)) => {
            let desk = AuditDesk::empty(config)?;
            let (templates, _) = with_retries(|| desk.list_templates()).await;
            let templates = templates?;

            if json {
                print_json(&templates)?;
            } else {
                for template in &templates {
                    println!(
                        "{:<6} {:<20} {:<12} {} checks",
                        template.id, template.name, template.process, template.check_count
                    );
                }
            }
        }
        Some(("show", args)) => {
            let Some(id) = args.get_one::<String>("audit-id") else {
                bail!("missing audit id");
            };
            let desk = AuditDesk::seeded(config)?;
            let id = AuditId::from(id.as_str());
            let (snapshot, _) = with_retries(|| desk.get_audit(&id)).await;
            let snapshot = snapshot?;

            if json {
                print_json(&snapshot)?;
            } else {
                let audit = &snapshot.audit;
                println!("{} {} [{}] {}%", audit.id, audit.name, audit.status, audit.progress);
                println!("  owner: {}  process: {}  due: {}", audit.owner.name, audit.process, audit.target_date);
                for check in &snapshot.checks {
                    println!("  {:<20} {:<8} {:?}  {}", check.id, check.status, check.priority, check.title);
                }
            }
        }
        _ => bail!("unknown command"),
    }
    Ok(())
}
