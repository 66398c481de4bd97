use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rust_decimal::Decimal;

use pennywise_rs::{
    AccountKind, ConnectionMonitor, ConnectionPool, Ledger, NewAccount, RetryPolicy,
    endpoints::{self, format_endpoint},
};

/// A utility for creating a test database for the REST API server of pennywise_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// The identity the test user authenticates with.
    #[arg(long, default_value = "test_user")]
    identity: String,

    /// The number of transactions to generate for each account.
    #[arg(long, short, default_value_t = 150)]
    count: u32,
}

/// Create and populate a database for manual testing.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let ledger = Ledger::new(
        ConnectionPool::open(output_path, 1)?,
        ConnectionMonitor::new(RetryPolicy::default()),
    );

    println!("Creating test user...");
    let owner = ledger.create_user(&args.identity, "Test User").await?.id;

    for (name, kind, balance) in [
        ("Everyday", AccountKind::Checking, Decimal::new(250_000, 2)),
        ("Savings", AccountKind::Savings, Decimal::new(1_000_000, 2)),
    ] {
        println!("Creating account {name} with {} transactions...", args.count);

        let account = ledger
            .create_account(
                owner,
                NewAccount {
                    name: name.to_owned(),
                    kind,
                    balance,
                    is_default: false,
                },
            )
            .await?;
        let created = ledger
            .create_test_transactions(owner, account.id, args.count)
            .await?;

        println!(
            "Account {name} has a balance of ${}, see {}",
            created.account.balance,
            format_endpoint(endpoints::ACCOUNT_TRANSACTIONS, account.id)
        );
    }

    println!("Success! Authenticate with 'Authorization: Bearer {}'", args.identity);

    Ok(())
}
