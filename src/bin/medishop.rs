//! Admin CLI for the medishop category tree and price resolver.

use std::collections::HashSet;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use indicatif::{ProgressBar, ProgressStyle};
use medishop_catalog::catalog::{CatalogBlocking, TreeRow, price};
use medishop_catalog::client::RestBlockingStore;
use medishop_catalog::editor::{add_child, move_to, remove, rename, reorder};
use medishop_catalog::error::{CatalogError, Result as CatalogResult};
use medishop_catalog::models::{Category, CategoryId, PricingTier, ProductPricing};
use medishop_catalog::pricing::{PriceQuote, next_tier};
use medishop_catalog::store::{BlockingCategoryStore, FileStore};
use medishop_catalog::sync::SyncReport;
use owo_colors::OwoColorize;

/// Environment variable holding the remote store API key.
const API_KEY_ENV: &str = "MEDISHOP_API_KEY";

/// Environment variable holding the remote store URL.
const REMOTE_URL_ENV: &str = "MEDISHOP_REMOTE_URL";

/// Medishop catalog admin — edit the category tree and check prices.
#[derive(Debug, Parser)]
#[command(name = "medishop", version, about)]
struct Cli {
    /// Override the local storage directory (default: XDG data dir).
    #[arg(long, global = true, value_name = "DIR", conflicts_with = "remote")]
    data_dir: Option<PathBuf>,
    /// Use the remote store at this URL instead of local files.
    #[arg(long, global = true, value_name = "URL")]
    remote: Option<String>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Show the category tree.
    Tree {
        /// Hide the subtree below this category (repeatable).
        #[arg(long, value_parser = parse_id)]
        collapse: Vec<CategoryId>,
    },
    /// Add a category, at the root level unless a parent is given.
    Add {
        /// Parent category id.
        #[arg(long, value_parser = parse_id)]
        parent: Option<CategoryId>,
        /// Name of the new category.
        name: String,
    },
    /// Rename a category.
    Rename {
        /// Category id.
        #[arg(value_parser = parse_id)]
        id: CategoryId,
        /// New name.
        name: String,
    },
    /// Remove a category without children or products.
    Remove {
        /// Category id.
        #[arg(value_parser = parse_id)]
        id: CategoryId,
    },
    /// Move a category in front of a sibling.
    Move {
        /// Category being moved.
        #[arg(value_parser = parse_id)]
        dragged: CategoryId,
        /// Sibling whose position it takes.
        #[arg(value_parser = parse_id)]
        target: CategoryId,
    },
    /// Move a category under another parent (root level without --parent).
    Reparent {
        /// Category id.
        #[arg(value_parser = parse_id)]
        id: CategoryId,
        /// New parent id.
        #[arg(long, value_parser = parse_id)]
        parent: Option<CategoryId>,
    },
    /// Resolve the price of a cart line.
    Price {
        /// Unit price without any tier.
        #[arg(long)]
        base: f64,
        /// Quantity tier as MIN_QTY:UNIT_PRICE (repeatable).
        #[arg(long, value_parser = parse_tier)]
        tier: Vec<PricingTier>,
        /// Ordered quantity.
        #[arg(long)]
        qty: u32,
        /// Apply the subscription discount.
        #[arg(long)]
        subscription: bool,
    },
}

/// Parses a category id for clap.
fn parse_id(raw: &str) -> Result<CategoryId, String> {
    raw.parse::<CategoryId>().map_err(|err| err.to_string())
}

/// Parses a `MIN_QTY:UNIT_PRICE` tier for clap.
fn parse_tier(raw: &str) -> Result<PricingTier, String> {
    let (quantity, unit_price) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected MIN_QTY:UNIT_PRICE, got {raw:?}"))?;
    let min_quantity = quantity
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("invalid quantity {quantity:?}: {err}"))?;
    let price_value = unit_price
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid price {unit_price:?}: {err}"))?;
    Ok(PricingTier::new(min_quantity, price_value))
}

/// Reads the remote API key from the environment.
fn read_api_key() -> io::Result<Option<String>> {
    match std::env::var(API_KEY_ENV) {
        Ok(val) if !val.is_empty() => Ok(Some(val)),
        _ => {
            let mut err = io::stderr().lock();
            writeln!(
                err,
                "{} {} environment variable is not set",
                "error:".red().bold(),
                API_KEY_ENV.bold()
            )?;
            writeln!(
                err,
                "  {} create a .env file with {}=<your_key>",
                "hint:".cyan(),
                API_KEY_ENV
            )?;
            Ok(None)
        }
    }
}

/// Returns the remote URL from the flag or the environment.
fn remote_url(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var(REMOTE_URL_ENV).ok())
        .filter(|url| !url.is_empty())
}

/// Runs the CLI, returning an appropriate exit code.
fn run() -> io::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Command::Price {
        base,
        tier,
        qty,
        subscription,
    } = cli.command
    {
        return cmd_price(base, tier, qty, subscription);
    }

    if let Some(url) = remote_url(cli.remote) {
        let Some(key) = read_api_key()? else {
            return Ok(ExitCode::FAILURE);
        };
        return match create_remote_store(url, key) {
            Ok(store) => with_catalog(store, cli.command),
            Err(err) => report_error("failed to configure remote store", &err),
        };
    }

    match create_file_store(cli.data_dir) {
        Ok(store) => with_catalog(store, cli.command),
        Err(err) => report_error("failed to initialize storage", &err),
    }
}

/// Creates the file store, using `data_dir` if provided or the default
/// XDG data directory otherwise.
fn create_file_store(data_dir: Option<PathBuf>) -> CatalogResult<FileStore> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => FileStore::default_dir()?,
    };
    FileStore::new(dir)
}

/// Creates the remote store.
fn create_remote_store(url: String, api_key: String) -> CatalogResult<RestBlockingStore> {
    RestBlockingStore::builder()
        .base_url(url)
        .api_key(api_key)
        .build()
}

/// Wraps a store in a catalog session and runs the command.
fn with_catalog<S: BlockingCategoryStore>(store: S, command: Command) -> io::Result<ExitCode> {
    match CatalogBlocking::builder().storage(store).build() {
        Ok(catalog) => dispatch(&catalog, command),
        Err(err) => report_error("failed to open catalog", &err),
    }
}

/// Dispatches to the appropriate subcommand handler.
fn dispatch<S: BlockingCategoryStore>(
    catalog: &CatalogBlocking<S>,
    command: Command,
) -> io::Result<ExitCode> {
    match command {
        Command::Tree { collapse } => cmd_tree(catalog, &TreeView::collapsed(collapse)),
        Command::Add { parent, name } => {
            cmd_edit(catalog, |draft| add_child(draft, parent.as_ref(), &name))
        }
        Command::Rename { id, name } => cmd_edit(catalog, |draft| rename(draft, &id, &name)),
        Command::Remove { id } => cmd_edit(catalog, |draft| remove(draft, &id)),
        Command::Move { dragged, target } => {
            cmd_edit(catalog, |draft| reorder(draft, &dragged, &target))
        }
        Command::Reparent { id, parent } => {
            cmd_edit(catalog, |draft| move_to(draft, &id, parent.as_ref()))
        }
        Command::Price {
            base,
            tier,
            qty,
            subscription,
        } => cmd_price(base, tier, qty, subscription),
    }
}

/// Prints an error with its operator-facing message.
fn report_error(context: &str, err: &CatalogError) -> io::Result<ExitCode> {
    writeln!(
        io::stderr().lock(),
        "{} {context}: {}",
        "error:".red().bold(),
        err.user_message()
    )?;
    Ok(ExitCode::FAILURE)
}

/// Executes the `tree` subcommand.
fn cmd_tree<S: BlockingCategoryStore>(
    catalog: &CatalogBlocking<S>,
    view: &TreeView,
) -> io::Result<ExitCode> {
    match catalog.tree() {
        Ok(rows) => {
            print_tree_table(&view.visible(&rows), view)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report_error("failed to read categories", &err),
    }
}

/// Loads the tree, applies one edit, saves, and prints the result.
///
/// A rejected edit prints its message and leaves the store untouched.
fn cmd_edit<S, F>(catalog: &CatalogBlocking<S>, edit: F) -> io::Result<ExitCode>
where
    S: BlockingCategoryStore,
    F: FnOnce(&[Category]) -> CatalogResult<Vec<Category>>,
{
    let draft = match catalog.load() {
        Ok(draft) => draft,
        Err(err) => return report_error("failed to read categories", &err),
    };
    let edited = match edit(&draft) {
        Ok(edited) => edited,
        Err(err) => return report_error("edit rejected", &err),
    };

    let spinner = make_spinner("Saving categories...");
    let result = catalog.save(&edited);
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            print_sync_summary(&report)?;
            cmd_tree(catalog, &TreeView::default())
        }
        Err(err) => report_error("save failed", &err),
    }
}

/// Executes the `price` subcommand.
fn cmd_price(
    base: f64,
    tiers: Vec<PricingTier>,
    quantity: u32,
    is_subscription: bool,
) -> io::Result<ExitCode> {
    let pricing = ProductPricing {
        base_price: base,
        tiers,
    };
    let result = price(&pricing, quantity, is_subscription);
    print_quote(&result, next_tier(&pricing.tiers, quantity))?;
    Ok(ExitCode::SUCCESS)
}

/// Expand/collapse state for one rendering of the tree.
#[derive(Debug, Default)]
struct TreeView {
    /// Categories whose subtrees are hidden.
    collapsed: HashSet<CategoryId>,
}

impl TreeView {
    /// Creates a view with the given categories collapsed.
    fn collapsed(ids: Vec<CategoryId>) -> Self {
        Self {
            collapsed: ids.into_iter().collect(),
        }
    }

    /// Returns `true` if the subtree of `id` is hidden.
    fn is_collapsed(&self, id: &CategoryId) -> bool {
        self.collapsed.contains(id)
    }

    /// Filters rows in display order, dropping descendants of collapsed
    /// categories.
    fn visible<'rows>(&self, rows: &'rows [TreeRow]) -> Vec<&'rows TreeRow> {
        let mut hidden_below: Option<usize> = None;
        let mut shown = Vec::with_capacity(rows.len());
        for row in rows {
            if hidden_below.is_some_and(|depth| row.depth > depth) {
                continue;
            }
            hidden_below = self
                .is_collapsed(&row.category.id)
                .then_some(row.depth);
            shown.push(row);
        }
        shown
    }
}

/// Prints the category tree in a table.
fn print_tree_table(rows: &[&TreeRow], view: &TreeView) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if rows.is_empty() {
        writeln!(out, "{}", "No categories yet.".dimmed())?;
        return Ok(());
    }

    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(vec![
        Cell::new("Category").fg(Color::Cyan),
        Cell::new("Id").fg(Color::Cyan),
        Cell::new("Order").fg(Color::Cyan),
        Cell::new("Products").fg(Color::Cyan),
    ]);

    for row in rows {
        let marker = if view.is_collapsed(&row.category.id) {
            "+ "
        } else {
            "  "
        };
        let label = format!("{}{marker}{}", "    ".repeat(row.depth), row.category.name);
        let products = if row.category.product_count > 0 {
            Cell::new(row.category.product_count).fg(Color::Yellow)
        } else {
            Cell::new(row.category.product_count).fg(Color::DarkGrey)
        };
        _ = table.add_row(vec![
            Cell::new(label),
            Cell::new(row.category.id),
            Cell::new(row.category.order),
            products,
        ]);
    }

    writeln!(out, "{table}")?;
    Ok(())
}

/// Prints what a save changed.
fn print_sync_summary(report: &SyncReport) -> io::Result<()> {
    writeln!(
        io::stdout().lock(),
        "{} {}",
        "Saved.".green().bold(),
        format_args!(
            "({} created, {} updated, {} deleted)",
            report.created.len(),
            report.updated,
            report.deleted.len()
        )
        .dimmed()
    )
}

/// Prints a price quote and the next tier hint, if any.
fn print_quote(quote: &PriceQuote, next: Option<&PricingTier>) -> io::Result<()> {
    let mut out = io::stdout().lock();
    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(vec![
        Cell::new("Quantity").fg(Color::Cyan),
        Cell::new("Tier").fg(Color::Cyan),
        Cell::new("Unit price").fg(Color::Cyan),
        Cell::new("After discount").fg(Color::Cyan),
        Cell::new("Total").fg(Color::Cyan),
    ]);
    let tier_label = quote
        .tier
        .map_or_else(|| "base".to_owned(), |tier| format!("{}+", tier.min_quantity));
    _ = table.add_row(vec![
        Cell::new(quote.quantity),
        Cell::new(tier_label),
        Cell::new(format!("{:.2}", quote.unit_price)),
        Cell::new(format!("{:.2}", quote.discounted_unit_price)),
        Cell::new(format!("{:.2}", quote.total)).fg(Color::Green),
    ]);
    writeln!(out, "{table}")?;

    if let Some(tier) = next {
        writeln!(
            out,
            "  {} order {} more to pay {:.2} each",
            "hint:".cyan(),
            tier.min_quantity.saturating_sub(quote.quantity),
            tier.unit_price
        )?;
    }
    Ok(())
}

/// Creates a spinner with the given message.
fn make_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_owned());
    spinner.enable_steady_tick(core::time::Duration::from_millis(80));
    spinner
}

/// Entry point.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            // If stderr itself failed there is nowhere left to report.
            let _ignored = writeln!(io::stderr(), "fatal I/O error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use medishop_catalog::catalog::tree_rows;
    use medishop_catalog::store::InMemoryStore;

    fn catalog() -> CatalogBlocking<InMemoryStore> {
        CatalogBlocking::builder()
            .storage(InMemoryStore::new())
            .build()
            .unwrap()
    }

    fn saved_root(catalog: &CatalogBlocking<InMemoryStore>, name: &str) -> CategoryId {
        let draft = catalog.load().unwrap();
        let _report = catalog.save(&add_child(&draft, None, name).unwrap()).unwrap();
        catalog
            .load()
            .unwrap()
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
            .unwrap()
    }

    // ── Argument parsing ───────────────────────────────────────────────

    #[test]
    fn parse_tier_valid() {
        let tier = parse_tier("5:90.5").unwrap();
        assert_eq!(tier.min_quantity, 5);
        assert!((tier.unit_price - 90.5).abs() < 1e-9);
    }

    #[test]
    fn parse_tier_invalid() {
        assert!(parse_tier("5").is_err());
        assert!(parse_tier("x:1").is_err());
        assert!(parse_tier("5:cheap").is_err());
    }

    #[test]
    fn parse_id_accepts_both_spaces() {
        assert!(matches!(parse_id("local-3"), Ok(CategoryId::Local(_))));
        assert!(matches!(
            parse_id("67e55044-10b1-426f-9247-bb680e5fe0c8"),
            Ok(CategoryId::Persistent(_))
        ));
        assert!(parse_id("nope").is_err());
    }

    #[test]
    fn cli_parses_price_command() {
        let cli = Cli::try_parse_from([
            "medishop", "price", "--base", "100", "--tier", "5:90", "--tier", "10:80", "--qty",
            "7", "--subscription",
        ])
        .unwrap();
        let mut shape = None;
        if let Command::Price { qty, subscription, tier, .. } = cli.command {
            shape = Some((qty, subscription, tier.len()));
        }
        assert_eq!(shape, Some((7, true, 2)));
    }

    #[test]
    fn remote_flag_wins_over_environment() {
        assert_eq!(
            remote_url(Some("http://flag".to_owned())).as_deref(),
            Some("http://flag")
        );
        assert!(remote_url(Some(String::new())).is_none());
    }

    // ── Store creation ─────────────────────────────────────────────────

    #[test]
    fn create_file_store_with_custom_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_file_store(Some(dir.path().to_path_buf())).is_ok());
    }

    #[test]
    fn create_remote_store_rejects_bad_url() {
        assert!(create_remote_store("not a url".to_owned(), "key".to_owned()).is_err());
    }

    // ── Editing commands ───────────────────────────────────────────────

    #[test]
    fn add_then_rename() {
        let catalog = catalog();
        let id = saved_root(&catalog, "Density");

        let code = cmd_edit(&catalog, |draft| rename(draft, &id, "Tubing")).unwrap();

        assert_eq!(code, ExitCode::SUCCESS);
        let names: Vec<String> = catalog.load().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["Tubing"]);
    }

    #[test]
    fn rejected_remove_leaves_store_untouched() {
        let catalog = catalog();
        let parent = saved_root(&catalog, "Density");
        let draft = catalog.load().unwrap();
        let _report = catalog
            .save(&add_child(&draft, Some(&parent), "Sub").unwrap())
            .unwrap();
        let before = catalog.load().unwrap();
        let writes = catalog.storage().upsert_count().unwrap();

        let code = cmd_edit(&catalog, |draft| remove(draft, &parent)).unwrap();

        assert_eq!(code, ExitCode::FAILURE);
        assert_eq!(catalog.load().unwrap(), before);
        assert_eq!(catalog.storage().upsert_count().unwrap(), writes);
    }

    #[test]
    fn failed_save_reports_failure() {
        let catalog = catalog();
        catalog.storage().fail_after_upserts(0).unwrap();
        let code = cmd_edit(&catalog, |draft| add_child(draft, None, "Density")).unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[test]
    fn dispatch_tree_on_empty_store() {
        let code = dispatch(&catalog(), Command::Tree { collapse: Vec::new() }).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    // ── Tree view ──────────────────────────────────────────────────────

    #[test]
    fn collapsed_subtree_is_hidden() {
        let draft = add_child(&[], None, "Density").unwrap();
        let root = draft.first().map(|c| c.id).unwrap();
        let draft = add_child(&draft, Some(&root), "Sub").unwrap();
        let draft = add_child(&draft, None, "Tubing").unwrap();
        let rows = tree_rows(&draft);

        let view = TreeView::collapsed(vec![root]);
        let names: Vec<&str> = view
            .visible(&rows)
            .iter()
            .map(|r| r.category.name.as_str())
            .collect();

        assert_eq!(names, ["Density", "Tubing"]);
        assert_eq!(TreeView::default().visible(&rows).len(), 3);
        print_tree_table(&view.visible(&rows), &view).unwrap();
    }

    // ── Output ─────────────────────────────────────────────────────────

    #[test]
    fn price_command_prints_quote() {
        let code = cmd_price(100.0, vec![PricingTier::new(5, 90.0)], 3, true).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn print_tree_table_empty() {
        print_tree_table(&[], &TreeView::default()).unwrap();
    }
}
