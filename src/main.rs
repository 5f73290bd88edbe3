use std::{ path::PathBuf, process, sync::Arc, time::Duration };

use clap::{ Parser, Subcommand };
use tokio::sync::watch;
use tracing::error;

extern crate s7page;
use s7page::controller::DEFAULT_DB;
use s7page::db::DataBlock;
use s7page::logging::{ init_logging, LogTarget };
use s7page::{ Error, ErrorKind, Field, HttpAgent, KeyMapping, MemoryPage, Page, PageController, PollOutcome, Poller };

#[derive(Parser)]
#[command(name = "s7page", version, about = "Read and write the fields of an S7 PLC user-defined web page")]
struct Cli {
    /// Page url, e.g. http://192.168.0.1/awp/app/index.html (https needs a
    /// build with `--features tls`)
    #[arg(long, global = true, env = "S7PAGE_URL")]
    url: Option<String>,

    /// Data block holding data1..data4
    #[arg(long, global = true, default_value = DEFAULT_DB)]
    db: String,

    /// Write each field under its own key instead of data1's (the page as
    /// deployed sends every field as data1)
    #[arg(long, global = true)]
    per_field_keys: bool,

    /// Append log output to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command
}

#[derive(Subcommand)]
enum Command {
    /// Post one value
    Send {
        /// 1-4 or data1-data4
        field: Field,
        value: String
    },
    /// Print live values as json lines
    Poll {
        /// Poll a single time and exit
        #[arg(long)]
        once: bool,
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64
    },
    /// Interactive terminal page
    Ui {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64
    },
    /// Generate the SCL source of a data block
    GenDb {
        /// Json description; without it the page's block (data1..data4 DInt) is generated
        description: Option<PathBuf>,
        /// Output file, defaults to <name>.db
        #[arg(short, long)]
        output: Option<PathBuf>
    }
}

type Controller = PageController<HttpAgent, Arc<MemoryPage>>;

fn controller(cli: &Cli) -> Result<Controller, Error> {
    let url = cli.url.as_deref()
        .ok_or_else(|| Error::config("a page url is required (--url or S7PAGE_URL)"))?;
    let keys = if cli.per_field_keys { KeyMapping::PerField } else { KeyMapping::Legacy };

    Ok(PageController::new(HttpAgent::new(), Arc::new(MemoryPage::with_fields()), url)?
        .db(cli.db.as_str())
        .key_mapping(keys))
}

async fn run(cli: Cli) -> Result<(), Error> {
    match &cli.command {
        Command::Send { field, value } => {
            let ctl = controller(&cli)?;
            ctl.page().set_content(&field.output_id(), value)?;
            ctl.send(*field).await
        },
        Command::Poll { once: true, .. } => {
            match controller(&cli)?.poll().await? {
                PollOutcome::Updated(snapshot) => {
                    println!("{}", snapshot);
                    Ok(())
                },
                PollOutcome::Status(code) => Err(Error::new(ErrorKind::HttpError, format!("status {}", code)))
            }
        },
        Command::Poll { once: false, interval_ms } => {
            let poller = Poller::new(Arc::new(controller(&cli)?), Duration::from_millis(*interval_ms));
            let (stop, shutdown) = watch::channel(false);

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = stop.send(true);
                }
            });

            poller.run(shutdown, |outcome| {
                if let Ok(PollOutcome::Updated(snapshot)) = outcome {
                    println!("{}", snapshot);
                }
            }).await;
            Ok(())
        },
        Command::Ui { interval_ms } => {
            let ctl = Arc::new(controller(&cli)?);
            s7page::ui::App::new(ctl, Duration::from_millis(*interval_ms)).run().await
        },
        Command::GenDb { description, output } => {
            let db = match description {
                Some(path) => DataBlock::from_json(&std::fs::read_to_string(path)?)?,
                None => DataBlock::for_page(cli.db.as_str())
            };
            let path = output.clone().unwrap_or_else(|| db.default_file_name());
            db.write_to(&path)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let target = match (&cli.log_file, &cli.command) {
        (Some(path), _) => LogTarget::File(path),
        (None, Command::Ui { .. }) => LogTarget::Off,
        (None, _) => LogTarget::Stderr
    };
    if let Err(err) = init_logging(cli.verbose, target) {
        eprintln!("s7page: {}", err);
        process::exit(2);
    }

    if let Err(err) = run(cli).await {
        error!(error = %err, "failed");
        eprintln!("s7page: {}", err);
        process::exit(1);
    }
}
