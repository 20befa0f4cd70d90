//! Crow Studio: compiles an `.iml` document, instantiates it and prints the
//! resulting widget trees.
//!
//! ```text
//! crow-studio ui/main.iml --count 2 --click Save.Clicked --plan
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use crow_ui::prelude::*;
use log::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "crow-studio", version, about = "Compile and instantiate Crow markup")]
struct Cli {
    /// Document to compile.
    path: PathBuf,

    /// Number of independent trees to build from the compiled document.
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Drop bindings whose named target cannot be resolved instead of failing.
    #[arg(long)]
    lenient: bool,

    /// Log filter in `env_logger` syntax, e.g. `crow_iml=debug`.
    #[arg(long)]
    log_filter: Option<String>,

    /// Print the compiled instruction list.
    #[arg(long)]
    plan: bool,

    /// Raise an event on a named widget of every tree, e.g. `Save.Clicked`.
    #[arg(long = "click", value_name = "NAME.EVENT")]
    clicks: Vec<String>,

    /// Data items handed to every `ListBox`.
    #[arg(long, default_value_t = 3)]
    items: usize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(LoggingConfig { env_filter: cli.log_filter.clone(), ..LoggingConfig::default() });

    let catalog = Arc::new(studio_catalog());
    let rt = studio_runtime(Arc::clone(&catalog));

    let root_dir = cli.path.parent().map(PathBuf::from).unwrap_or_default();
    let name = cli
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("`{}` does not name a file", cli.path.display()))?;
    let mode = if cli.lenient { NameResolution::Lenient } else { NameResolution::Strict };
    let ui = Interface::new(Arc::clone(&catalog))
        .with_root(root_dir)
        .with_options(CompileOptions::new().name_resolution(mode));

    let inst = ui.load(name)?;
    info!("compiled `{name}`: <{}>, {} slot(s), {} op(s)", inst.root_type().name, inst.slot_count(), inst.ops().len());
    if cli.plan {
        for op in inst.ops() {
            println!("{op}");
        }
        println!();
    }

    let clicks = cli.clicks.iter().map(|c| parse_click(c)).collect::<anyhow::Result<Vec<_>>>()?;

    for i in 0..cli.count {
        let session = rt.make("Session").context("catalog has no Session type")?;
        rt.set_member_value(&session, "Title", Value::Str(format!("Session {}", i + 1)));
        let root = ui.create_with(&rt, name, Some(session))?;

        for list in lists(&rt, root) {
            let missions: Vec<Element> = (0..cli.items).filter_map(|n| mission(&rt, n)).collect();
            rt.populate(list, &missions);
        }
        for (target, event) in &clicks {
            let Some(sender) = rt.find_descendant_by_name(&root, target) else {
                bail!("no widget named `{target}` in tree {}", i + 1);
            };
            if !rt.raise(sender, event).is_consumed() {
                debug!("{target}.{event} has no handlers");
            }
        }

        println!("── tree {} ──", i + 1);
        print!("{}", dump(&rt, root));
    }

    let stats = rt.stats();
    info!(
        "{} widget(s), {} parent lookup(s), {} method call(s)",
        stats.instances(),
        stats.parent_lookups(),
        stats.method_calls()
    );
    Ok(())
}

// ── Application types ─────────────────────────────────────────────────────

fn studio_catalog() -> TypeCatalog {
    let mut catalog = standard_catalog();
    catalog.register(
        TypeDescriptor::new("Session", Capability::Leaf)
            .doc("Data source of every tree the studio builds.")
            .property("Title", ValueKind::Str, "Session caption.")
            .property("Count", ValueKind::Int, "Incremented by `increment()`.")
            .method("save", "Prints the session title.")
            .method("increment", "Adds one to `Count`."),
    );
    catalog.register(
        TypeDescriptor::new("Mission", Capability::Leaf)
            .doc("A data item shown by list rows.")
            .property("Name", ValueKind::Str, "Mission name.")
            .property("Status", ValueKind::Str, "Progress label.")
            .method("advance", "Marks the mission done."),
    );
    catalog
}

fn studio_runtime(catalog: Arc<TypeCatalog>) -> UiRuntime {
    UiRuntime::new(catalog)
        .with_method("Session", "save", |rt, session, sender| {
            println!("[save] {} (from {sender})", rt.value(session, "Title"));
        })
        .with_method("Session", "increment", |rt, session, _| {
            let count = rt.value(session, "Count").as_f64().unwrap_or(0.0) as i64;
            rt.set_member_value(&session, "Count", Value::Int(count + 1));
        })
        .with_method("Mission", "advance", |rt, mission, _| {
            rt.set_member_value(&mission, "Status", Value::Str("done".into()));
        })
}

fn mission(rt: &UiRuntime, n: usize) -> Option<Element> {
    const NAMES: [&str; 5] = ["Survey", "Relay", "Salvage", "Escort", "Return"];
    let m = rt.make("Mission")?;
    rt.set_member_value(&m, "Name", Value::Str(format!("{} {}", NAMES[n % NAMES.len()], n + 1)));
    rt.set_member_value(&m, "Status", Value::Str("pending".into()));
    Some(m)
}

/// Every `ListBox` in the tree, parents before children.
fn lists(rt: &UiRuntime, root: Element) -> Vec<Element> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(e) = stack.pop() {
        if rt.type_name(&e) == "ListBox" {
            out.push(e);
        }
        stack.extend(rt.children(e).into_iter().rev());
    }
    out
}

fn parse_click(arg: &str) -> anyhow::Result<(String, String)> {
    match arg.rsplit_once('.') {
        Some((name, event)) if !name.is_empty() && !event.is_empty() => Ok((name.to_string(), event.to_string())),
        _ => bail!("expected NAME.EVENT, got `{arg}`"),
    }
}
