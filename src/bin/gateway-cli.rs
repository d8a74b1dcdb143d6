use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Client for the command gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the gateway answers
    Ping,
    /// List the commands the engine exposes
    Commands,
    /// List neighbour gateways
    Hosts,
    /// Collect neighbour versions
    Versions,
    /// Show the effective configuration
    Config,
    /// Invoke a command
    Call {
        name: String,
        /// HTTP method; GET, POST or PUT depending on the command
        #[arg(short, long, default_value = "GET")]
        method: String,
        /// JSON parameters sent in X-YT-Parameters
        #[arg(short, long)]
        parameters: Option<String>,
        /// Request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Ping => {
            let res = client.get(format!("{}/ping", cli.url)).send().await?;
            println!("{}", res.status());
        }
        Commands::Commands => {
            let res = client.get(format!("{}/api", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Hosts => {
            let res = client.get(format!("{}/hosts", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Versions => {
            let res = client.get(format!("{}/versions", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Config => {
            let res = client.get(format!("{}/__config__", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Call {
            name,
            method,
            parameters,
            data,
        } => {
            let mut headers = HeaderMap::new();
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
            if let Some(parameters) = parameters {
                headers.insert("x-yt-parameters", HeaderValue::from_str(&parameters)?);
            }

            let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
            let mut request = client
                .request(method, format!("{}/api/{}", cli.url, name))
                .headers(headers);
            if let Some(data) = data {
                request = request.body(data);
            }

            let res = request.send().await?;
            if let Some(error) = res.headers().get("x-yt-error") {
                eprintln!("Engine error: {}", error.to_str().unwrap_or("<binary>"));
            }
            let status = res.status();
            let text = res.text().await?;
            if !status.is_success() {
                eprintln!("Error: gateway returned status {}", status);
            }
            println!("{}", text);
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
