use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use turnto_feeds::{
    init_tracing_once, CatalogExport, CatalogIndex, ExportOptions, JobParameters, NdjsonOrders, NdjsonProducts,
    OrderExport, RunResult, SitePreferences, StorefrontUrls,
};

/// Export TurnTo catalog and order feeds from platform data dumps
#[derive(Parser, Debug)]
#[command(name = "turnto-feeds")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Site preferences JSON (locales, auth keys, order window, storefront)
    #[arg(long, env = "TURNTO_SITE_CONFIG")]
    site: PathBuf,

    /// Root of the import/export area; feeds go to <root>/TurnTo/
    #[arg(long, default_value = "./impex")]
    export_root: PathBuf,

    /// Base name of the feed files (ExportFileName job parameter)
    #[arg(long)]
    export_file_name: Option<String>,

    /// Treat the step as disabled (IsDisabled job parameter)
    #[arg(long)]
    disabled: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Catalog feed, one file per active locale group
    Catalog {
        /// Products as NDJSON, optionally .zst compressed
        #[arg(long)]
        products: PathBuf,

        /// Categories as NDJSON
        #[arg(long)]
        categories: Option<PathBuf>,

        /// Products buffered per write cycle
        #[arg(long, default_value_t = 100)]
        chunk_size: usize,
    },

    /// Orders from the last `turntoHistoricalOrderDays` days
    Orders(OrderArgs),

    /// Orders created on or after `turntoHistoricalOrderDate`
    OrdersByDate(OrderArgs),
}

#[derive(Args, Debug)]
struct OrderArgs {
    /// Orders as NDJSON
    #[arg(long)]
    orders: PathBuf,

    /// Products as NDJSON, for line item titles, links and images
    #[arg(long)]
    products: Option<PathBuf>,

    /// Categories as NDJSON
    #[arg(long)]
    categories: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing_once();
    let cli = Cli::parse();

    let site = SitePreferences::load(&cli.site)?;
    let params = JobParameters { export_file_name: cli.export_file_name.clone(), is_disabled: cli.disabled };
    let options = ExportOptions::default()
        .with_export_root(&cli.export_root)
        .with_progress(!cli.no_progress);
    let urls = StorefrontUrls::new(&site.storefront.scheme, &site.storefront.host, &site.site_id)?;
    let buf = options.read_buffer_bytes;

    let result: RunResult = match &cli.command {
        Command::Catalog { products, categories, chunk_size } => {
            let source = NdjsonProducts::new(products, buf);
            let lookup = CatalogIndex::load(categories.as_deref(), None, buf)?;
            let options = options.with_chunk_size(*chunk_size).with_progress_label("Export catalog");
            let result = CatalogExport::new(params, &site, options, &source, &lookup, &urls).run();
            result
        }
        Command::Orders(args) | Command::OrdersByDate(args) => {
            let book = NdjsonOrders::new(&args.orders, buf);
            let wanted = book.referenced_products()?;
            let lookup =
                CatalogIndex::load_referenced(args.categories.as_deref(), args.products.as_deref(), &wanted, buf)?;
            let mut export = if matches!(cli.command, Command::Orders(_)) {
                OrderExport::rolling(params, &site, options, &book, &lookup, &urls)
            } else {
                OrderExport::by_date(params, &site, options, &book, &lookup, &urls)
            };
            let result = export.run();
            result
        }
    };

    println!("{result}");
    if !result.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}
