//! histbars CLI — retrieve historical bars from a TWS / IB Gateway session.
//!
//! Commands:
//! - `get-data` — fetch bars for one symbol, print a preview, optionally save CSV
//! - `list-enums` — list accepted asset types, bar sizes, durations and data types

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use histbars_core::export::save_csv;
use histbars_core::{
    AssetType, BarSize, ClientConfig, DataClient, DataType, Duration, HistoricalDataRequest,
    HistoricalDataResponse,
};

#[derive(Parser)]
#[command(
    name = "histbars",
    about = "histbars — historical market data from Interactive Brokers"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve historical data for a symbol.
    GetData(GetDataArgs),
    /// List accepted enum values.
    ListEnums,
}

#[derive(clap::Args)]
struct GetDataArgs {
    /// Symbol to retrieve data for (e.g., AAPL).
    symbol: String,

    /// Duration of data, by name or wire value (e.g., DAY_1 or "1 D").
    #[arg(long, default_value = "DAY_1")]
    duration: Duration,

    /// Bar size, by name or wire value (e.g., MIN_5 or "5 mins").
    #[arg(long, default_value = "MIN_5")]
    bar_size: BarSize,

    /// Data type: TRADES, BID_ASK, MIDPOINT, BID, ASK.
    #[arg(long, default_value = "TRADES")]
    data_type: DataType,

    /// Asset type: STK, OPT, FUT, CASH, IND.
    #[arg(long, default_value = "STK")]
    asset_type: AssetType,

    /// Exchange routing.
    #[arg(long, default_value = "SMART")]
    exchange: String,

    /// Option expiry (YYYYMMDD).
    #[arg(long)]
    expiry: Option<String>,

    /// Option strike.
    #[arg(long)]
    strike: Option<f64>,

    /// Option right: C, P, CALL or PUT.
    #[arg(long)]
    right: Option<String>,

    /// Save records to this CSV file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the full response as JSON instead of a table.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Skip the terminal preview.
    #[arg(long, default_value_t = false)]
    no_display: bool,

    /// Rows shown in the preview.
    #[arg(long, default_value_t = 20)]
    rows: usize,

    /// TOML file with host, port, client_id and timeout_secs.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Gateway host. Overrides config and TWS_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Gateway port. Overrides config and TWS_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// API client id. Overrides config and TWS_CLIENT_ID.
    #[arg(long)]
    client_id: Option<i32>,

    /// Seconds to wait for the request to complete.
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::GetData(args) => run_get_data(args),
        Commands::ListEnums => {
            list_enums();
            Ok(())
        }
    }
}

fn resolve_config(args: &GetDataArgs) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ClientConfig::from_env()?,
    };
    if let Some(host) = &args.host {
        config = config.with_host(host.as_str());
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if let Some(client_id) = args.client_id {
        config = config.with_client_id(client_id);
    }
    Ok(config)
}

fn build_request(args: &GetDataArgs) -> Result<HistoricalDataRequest> {
    let mut builder = HistoricalDataRequest::builder(args.symbol.as_str())
        .duration(args.duration)
        .bar_size(args.bar_size)
        .data_type(args.data_type)
        .asset_type(args.asset_type)
        .exchange(args.exchange.as_str());
    if let Some(expiry) = &args.expiry {
        builder = builder.expiry(expiry.as_str());
    }
    if let Some(strike) = args.strike {
        builder = builder.strike(strike);
    }
    if let Some(right) = &args.right {
        builder = builder.right(right.as_str());
    }
    Ok(builder.build()?)
}

fn run_get_data(args: GetDataArgs) -> Result<()> {
    if args.rows == 0 && !args.no_display && !args.json {
        bail!("--rows must be at least 1 (use --no-display to skip the preview)");
    }

    let request = build_request(&args)?;
    let config = resolve_config(&args)?;
    println!(
        "Retrieving {} data for {} from {}:{}",
        request.data_type(),
        request.symbol(),
        config.host,
        config.port
    );

    let client = DataClient::new(config);
    let result = client.fetch(&request, StdDuration::from_secs(args.timeout));
    client.disconnect();
    let response = result?;

    if response.is_empty() {
        println!("No data retrieved");
        return Ok(());
    }
    println!("Successfully retrieved {} records", response.record_count());

    if args.json {
        println!("{}", response.to_json()?);
    } else if !args.no_display {
        print_preview(&response, args.rows);
    }

    if let Some(path) = &args.output {
        save_output(&response, path)?;
    }
    Ok(())
}

fn save_output(response: &HistoricalDataResponse, path: &Path) -> Result<()> {
    save_csv(response, path).with_context(|| format!("writing {}", path.display()))?;
    println!("Data saved to {}", path.display());
    Ok(())
}

/// Left-aligned text table of the first `rows` records, with a trailing
/// "..." row when truncated.
fn print_preview(response: &HistoricalDataResponse, rows: usize) {
    let columns = response.column_names();
    let mut cells: Vec<Vec<String>> = response
        .data()
        .iter()
        .take(rows)
        .map(|record| {
            columns
                .iter()
                .map(|name| record.get(name).map(|v| v.to_string()).unwrap_or_default())
                .collect()
        })
        .collect();
    if response.record_count() > rows {
        cells.push(vec!["...".to_string(); columns.len()]);
    }

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].len())
                .max()
                .unwrap_or(0)
                .max(name.len())
        })
        .collect();

    println!("\nHistorical Data - {}", response.request().symbol());
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(name, &w)| format!("{name:<w$}"))
        .collect();
    println!("{}", header.join("  "));
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  ")
    );
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect();
        println!("{}", line.join("  "));
    }
}

fn list_enums() {
    println!("Available Asset Types:");
    for v in AssetType::ALL {
        println!("  {}: {}", v.name(), v.as_str());
    }

    println!("\nAvailable Bar Sizes:");
    for v in BarSize::ALL {
        println!("  {}: {}", v.name(), v.as_str());
    }

    println!("\nAvailable Durations:");
    for v in Duration::ALL {
        println!("  {}: {}", v.name(), v.as_str());
    }

    println!("\nAvailable Data Types:");
    for v in DataType::ALL {
        println!("  {}: {}", v.name(), v.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn get_data_defaults() {
        let cli = Cli::try_parse_from(["histbars", "get-data", "aapl"]).unwrap();
        let Commands::GetData(args) = cli.command else {
            panic!("expected get-data");
        };
        assert_eq!(args.duration, Duration::Day1);
        assert_eq!(args.bar_size, BarSize::Min5);
        assert_eq!(args.data_type, DataType::Trades);
        assert_eq!(args.rows, 20);

        let request = build_request(&args).unwrap();
        assert_eq!(request.symbol(), "AAPL");
        assert_eq!(request.exchange(), "SMART");
    }

    #[test]
    fn enums_accept_wire_values() {
        let cli = Cli::try_parse_from([
            "histbars", "get-data", "SPY", "--bar-size", "1 hour", "--duration", "1 W",
            "--data-type", "bid_ask",
        ])
        .unwrap();
        let Commands::GetData(args) = cli.command else {
            panic!("expected get-data");
        };
        assert_eq!(args.bar_size, BarSize::Hour1);
        assert_eq!(args.duration.as_str(), "1 W");
        assert_eq!(args.data_type, DataType::BidAsk);
    }

    #[test]
    fn bad_enum_is_a_parse_error() {
        assert!(Cli::try_parse_from(["histbars", "get-data", "SPY", "--bar-size", "7 mins"]).is_err());
    }

    #[test]
    fn option_flags_reach_the_request() {
        let cli = Cli::try_parse_from([
            "histbars", "get-data", "AAPL", "--asset-type", "OPT", "--expiry", "20240119",
            "--strike", "150", "--right", "call",
        ])
        .unwrap();
        let Commands::GetData(args) = cli.command else {
            panic!("expected get-data");
        };
        let request = build_request(&args).unwrap();
        assert_eq!(request.asset_type(), AssetType::Opt);
        assert_eq!(request.right(), Some("CALL"));
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "histbars", "get-data", "AAPL", "--host", "10.0.0.5", "--port", "4002",
            "--client-id", "9",
        ])
        .unwrap();
        let Commands::GetData(args) = cli.command else {
            panic!("expected get-data");
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 4002);
        assert_eq!(config.client_id, 9);
    }
}
