use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table, row};
use tracing::Level;

use pagedb::{DEFAULT_PAGE_SIZE, FileId, StorageConfig, StorageEngine, StorageFile};

#[derive(Parser)]
#[command(name = "pagedb", version, about = "Inspect pagedb relation files")]
struct Cli {
    /// Log page traffic at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a relation file's header and per-page occupancy, read from disk
    Inspect { file: PathBuf },

    /// Decode and print every tuple of a relation
    Dump {
        data_dir: PathBuf,
        relation: String,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
}

fn inspect(path: PathBuf) -> Result<(), Box<dyn Error>> {
    let file = StorageFile::open(FileId(0), &path)?;

    let mut header = Table::new();
    header.add_row(row!["file", path.display()]);
    header.add_row(row!["layout", file.layout()]);
    header.add_row(row!["page size", file.page_size()]);
    header.add_row(row!["header bytes", file.header_size()]);
    header.add_row(row!["pages", file.num_pages()]);
    header.add_row(row!["file bytes", file.size()?]);
    header.add_row(row!["schema", file.schema().name()]);
    for field in file.schema().fields() {
        header.add_row(row![format!("  {}", field.name), field.field_type]);
    }
    header.printstd();

    let mut pages = Table::new();
    pages.set_titles(row!["page", "tuples", "capacity", "used", "free", "header"]);
    for page in file.direct_pages() {
        let (page_id, page) = page?;
        pages.add_row(row![
            page_id.page_index,
            page.num_tuples(),
            page.capacity(),
            page.used_space(),
            page.free_space(),
            page.header_size()
        ]);
    }
    pages.printstd();
    Ok(())
}

fn dump(data_dir: PathBuf, relation: &str, page_size: usize) -> Result<(), Box<dyn Error>> {
    let config = StorageConfig::new(data_dir).with_page_size(page_size);
    let mut engine = StorageEngine::open(config)?;
    let schema = engine.schema(relation)?.clone();

    let mut table = Table::new();
    let mut titles = vec![Cell::new("tuple")];
    titles.extend(schema.fields().iter().map(|f| Cell::new(&f.name)));
    table.set_titles(Row::new(titles));

    for page in engine.pages(relation)? {
        let (_, page) = page?;
        for tuple_id in page.tuple_ids() {
            let record = schema.unpack(&page.get_tuple(tuple_id)?)?;
            let mut cells = vec![Cell::new(&tuple_id.to_string())];
            cells.extend(record.values().iter().map(|v| Cell::new(&v.to_string())));
            table.add_row(Row::new(cells));
        }
    }
    table.printstd();
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Inspect { file } => inspect(file),
        Command::Dump {
            data_dir,
            relation,
            page_size,
        } => dump(data_dir, &relation, page_size),
    }
}
