use clap::Parser;
use log::{error, info};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tzserver::client::run_client;
use tzserver::configuration::config::DEFAULT_PORT;

#[derive(Parser)]
#[command(name = "tzclient")]
#[command(version)]
#[command(about = "Interactive client for the timezone report server")]
struct Args {
    /// Server address
    #[arg(long, default_value = "127.0.0.1", env = "TZCLIENT_HOST")]
    host: String,

    /// Server port
    #[arg(long, short, default_value_t = DEFAULT_PORT, env = "TZCLIENT_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .format_target(false)
        .init();

    let args = Args::parse();

    let stream = match TcpStream::connect((args.host.as_str(), args.port)).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Unable to connect to {}:{}: {}", args.host, args.port, e);
            std::process::exit(1);
        }
    };
    info!("Connected to {}:{}", args.host, args.port);

    let mut stdout = tokio::io::stdout();
    if let Err(e) = run_client(stream, BufReader::new(tokio::io::stdin()), &mut stdout).await {
        error!("Connection error: {}", e);
        std::process::exit(1);
    }
    // stdin reads run on a blocking thread that would hold up runtime shutdown
    std::process::exit(0);
}
