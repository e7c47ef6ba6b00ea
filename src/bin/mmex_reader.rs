use std::{error::Error, io, path::PathBuf};

use clap::{Parser, Subcommand};

use mmex_reader::{
    AccountId, Config, DateRange, ExportFormat, FilterState, Reader, SearchField, SortColumn,
    SortDirection, Transaction, TypeFilter, format_currency, init_logging, parse_date,
    write_records,
};

/// Read accounts and transactions from a Money Manager Ex database.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON file with reader settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// File path to the MMEX database. Overrides the config file and
    /// MMEX_DB_PATH.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Log debug messages.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also append debug logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every account.
    Accounts,

    /// Show the balance of one account, or of every account.
    Balance {
        /// The account ID. Omit to show every account.
        account: Option<AccountId>,

        /// Only include transactions up to and including this date (YYYY-MM-DD).
        #[arg(long)]
        as_of: Option<String>,
    },

    /// List transactions in a date range.
    Transactions {
        /// The first date to include (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// The last date to include (YYYY-MM-DD).
        #[arg(long)]
        end: String,

        /// Only show this account's transactions.
        #[arg(long)]
        account: Option<AccountId>,

        /// Only show transactions containing this text.
        #[arg(long, default_value = "")]
        search: String,

        /// Where to look for the search text: all, payee, category, notes, tags or amount.
        #[arg(long, default_value = "all")]
        field: SearchField,

        /// Only show positive or negative amounts.
        #[arg(long = "type", default_value = "all")]
        type_filter: TypeFilter,

        /// The column to sort by.
        #[arg(long, default_value = "date")]
        sort: SortColumn,

        /// Sort largest first.
        #[arg(long)]
        descending: bool,

        /// The page to show, starting from 1.
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Transactions per page. Defaults to the configured page size.
        #[arg(long)]
        page_size: Option<usize>,

        /// Write every matching transaction to stdout as csv or json instead of a page.
        #[arg(long)]
        export: Option<ExportFormat>,
    },

    /// List the tables in the database and their columns.
    Schema,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    init_logging(args.verbose, args.log_file.as_deref())?;

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(db_path) = args.db_path {
        config.db_path = Some(db_path);
    }

    let reader = Reader::open(&config)?;

    let result = run(&reader, &config, args.command);
    reader.shutdown();

    result
}

fn run(reader: &Reader, config: &Config, command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Accounts => {
            for account in reader.list_accounts()? {
                println!(
                    "{:>4}  {:<24} {:<12} {:<6} {:>14}",
                    account.id,
                    account.name,
                    account.account_type,
                    account.status,
                    format_currency(account.initial_balance)
                );
            }
        }
        Command::Balance { account, as_of } => {
            let as_of = as_of.as_deref().map(parse_date).transpose()?;

            match account {
                Some(id) => {
                    let account = reader.get_account(id)?;
                    let balance = reader.get_balance(id, as_of)?;
                    println!("{}: {}", account.name, format_currency(balance));
                }
                None => {
                    for (account, balance) in reader.get_balances(as_of)? {
                        println!("{:<24} {:>14}", account.name, format_currency(balance));
                    }
                }
            }
        }
        Command::Transactions {
            start,
            end,
            account,
            search,
            field,
            type_filter,
            sort,
            descending,
            page,
            page_size,
            export,
        } => {
            let range = DateRange::parse(&start, &end)?;
            let set = reader.list_transactions(account, range)?;

            let mut filter = FilterState {
                search_text: search,
                search_field: field,
                type_filter,
                sort_column: sort,
                sort_direction: if descending {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                },
                page,
                page_size: page_size.unwrap_or(config.page_size),
            };

            if let Some(format) = export {
                filter.page = 1;
                filter.page_size = set.len().max(1);
                let view = reader.apply_view(&set, &filter);
                write_records(&view.records, format, io::stdout().lock())?;
                return Ok(());
            }

            let view = reader.apply_view(&set, &filter);
            for transaction in &view.records {
                print_transaction(transaction);
            }
            println!("{}", view.info.summary());
            if !set.tags_available {
                println!("(this database has no tag tables)");
            }
        }
        Command::Schema => {
            for relation in reader.describe_schema()? {
                println!("{}", relation.name);
                for column in relation.columns {
                    println!("    {column}");
                }
            }
        }
    }

    Ok(())
}

fn print_transaction(transaction: &Transaction) {
    println!(
        "{}  {:<16} {:<24} {:<16} {:>14}  {}",
        transaction.date,
        transaction.account_name.as_deref().unwrap_or("?"),
        transaction.payee.as_deref().unwrap_or(""),
        transaction.category.as_deref().unwrap_or(""),
        format_currency(transaction.amount),
        transaction.tag_string()
    );
}
